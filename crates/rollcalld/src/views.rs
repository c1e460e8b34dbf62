//! Server-rendered pages. Three small pages, kept as inline markup
//! rather than a template engine.

use rollcall_core::Identification;

/// Camera capture page: live preview, one capture button, and a hidden
/// form field the captured frame travels in.
pub fn capture_page() -> &'static str {
    r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Rollcall</title>
</head>
<body>
<h1>Rollcall</h1>
<p>Center your face in the frame and press capture.</p>
<video id="preview" autoplay playsinline width="480" height="360"></video>
<canvas id="frame" width="480" height="360" hidden></canvas>
<form id="capture-form" method="post" action="/">
<input type="hidden" name="image_data" id="image_data">
<button type="button" id="capture">Capture</button>
</form>
<p>Or pick a photo: <input type="file" id="photo" accept="image/*"></p>
<script>
const video = document.getElementById('preview');
navigator.mediaDevices.getUserMedia({ video: true })
  .then((stream) => { video.srcObject = stream; })
  .catch((err) => { console.error('camera unavailable', err); });
document.getElementById('capture').addEventListener('click', () => {
  const canvas = document.getElementById('frame');
  canvas.getContext('2d').drawImage(video, 0, 0, canvas.width, canvas.height);
  document.getElementById('image_data').value = canvas.toDataURL('image/png');
  document.getElementById('capture-form').submit();
});
document.getElementById('photo').addEventListener('change', (event) => {
  const file = event.target.files[0];
  if (!file) { return; }
  const reader = new FileReader();
  reader.onload = () => {
    document.getElementById('image_data').value = reader.result;
    document.getElementById('capture-form').submit();
  };
  reader.readAsDataURL(file);
});
</script>
</body>
</html>
"#
}

/// Result page for an identified probe: the identifier plus the full
/// record, pretty-printed.
pub fn result_page(identification: &Identification) -> String {
    let record = serde_json::to_string_pretty(&identification.record)
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Rollcall result</title>
</head>
<body>
<h1>Match found</h1>
<p>Identifier: <strong>{identifier}</strong></p>
<pre>{record}</pre>
<p><a href="/">Capture another</a></p>
</body>
</html>
"#,
        identifier = escape(&identification.identifier),
        record = escape(&record),
    )
}

pub fn no_match_page() -> &'static str {
    r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Rollcall result</title>
</head>
<body>
<h1>No match</h1>
<p>No matching record found.</p>
<p><a href="/">Capture another</a></p>
</body>
</html>
"#
}

/// Minimal HTML escaping for text interpolated into the result page.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
