/// Form plus a log viewer that polls `/logs` every 1.5 seconds
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>YouTube MP3 Downloader</title>
    <style>
        textarea {
            width: 100%;
            height: 300px;
            margin-top: 20px;
            resize: none;
            font-family: monospace;
            background-color: #f5f5f5;
        }
    </style>
    <script>
        async function fetchLogs() {
            try {
                const res = await fetch('/logs');
                const data = await res.json();
                document.getElementById('logbox').value = data.logs.join('\n');
            } catch (err) {
                console.error('log poll failed', err);
            }
        }

        setInterval(fetchLogs, 1500);
        window.onload = fetchLogs;
    </script>
</head>
<body>
    <h2>YouTube MP3 Downloader</h2>
    <form action="/download" method="post">
        YouTube URL: <input name="url" type="text" required><br><br>
        Folder Name: <input name="folder" type="text" required><br><br>
        <button type="submit">Download MP3</button>
    </form>

    <h3>Logs</h3>
    <textarea id="logbox" readonly></textarea>
</body>
</html>
"#;
