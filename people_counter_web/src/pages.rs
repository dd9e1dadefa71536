//! HTML pages. Only fixed strings and numbers are interpolated.

const HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>People counter</title>
</head>
<body>
<h2>Count people on a video</h2>
"#;

const TAIL: &str = "</body>\n</html>\n";

const UPLOAD_FORM: &str = r#"<form method="post" action="/" enctype="multipart/form-data">
<input type="file" name="file" accept="video/mp4" autocomplete="off" required>
<input type="submit" value="Submit">
</form>
"#;

pub fn upload_page(message: Option<&str>) -> String {
    let mut page = String::from(HEAD);
    if let Some(message) = message {
        page.push_str(&format!("<p class=\"message\">{message}</p>\n"));
    }
    page.push_str(UPLOAD_FORM);
    page.push_str(TAIL);
    page
}

/// `image_path` is the on-disk path, `image_url` where it is served from.
pub fn result_page(num_people: usize, image_path: &str, image_url: &str) -> String {
    format!(
        "{HEAD}<p>Number of people on the video: <b>{num_people}</b></p>\n\
         <p>Annotated frame saved to <code>{image_path}</code></p>\n\
         <img src=\"{image_url}\" alt=\"annotated frame\">\n\
         <p><a href=\"/\">Count another video</a></p>\n{TAIL}"
    )
}

pub fn failure_page() -> String {
    format!(
        "{HEAD}<p class=\"message\">Could not process the video. \
         Make sure it is a valid mp4 file with at least one frame.</p>\n{UPLOAD_FORM}{TAIL}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_page_message() {
        assert!(!upload_page(None).contains("class=\"message\""));
        assert!(upload_page(Some("File is not video")).contains("File is not video"));
    }

    #[test]
    fn test_result_page() {
        let page = result_page(3, "static/results/1700000000.jpg", "/static/results/1700000000.jpg");
        assert!(page.contains("<b>3</b>"));
        assert!(page.contains("src=\"/static/results/1700000000.jpg\""));
    }
}
