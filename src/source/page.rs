//! Page URL and header derivation
//!
//! Manga extensions smuggle request headers inside the image URL as
//! `&key=value` segments. The URL is returned unchanged; every segment
//! containing `=` is form-decoded into a header entry. `Referer` and
//! `Origin` are then forced to the owning source's base URL.

use std::collections::HashMap;

use super::manga::Page;

/// Split `image_url` on `&` and decode every `key=value` segment
pub fn page_to_url_and_headers(page: &Page) -> (String, HashMap<String, String>) {
    let mut headers = HashMap::new();
    let Some(image_url) = page.image_url.as_deref() else {
        return (String::new(), headers);
    };

    for part in image_url.split('&') {
        let Some((raw_key, raw_value)) = part.split_once('=') else {
            continue;
        };
        match (form_decode(raw_key), form_decode(raw_value)) {
            (Some(key), Some(value)) => {
                headers.insert(key, value);
            }
            _ => tracing::warn!(part = %part, "Skipping undecodable URL segment"),
        }
    }

    (image_url.to_string(), headers)
}

/// Headers for a page request after the Referer/Origin override
pub fn page_headers(page: &Page, base_url: &str) -> (String, HashMap<String, String>) {
    let (url, mut headers) = page_to_url_and_headers(page);
    headers.insert("Referer".to_string(), format!("{}/", base_url));
    headers.insert("Origin".to_string(), base_url.to_string());
    (url, headers)
}

fn form_decode(input: &str) -> Option<String> {
    urlencoding::decode(&input.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}
