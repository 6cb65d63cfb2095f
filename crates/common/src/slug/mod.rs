//! URL slugs and stored file names
//!
//! Both are `{HH.MM.SS}-{md5 hex}` with a suffix: the wall-clock time of
//! the request keeps names short and mostly unique, the digest makes them
//! URL safe whatever the input language.

use chrono::{NaiveTime, Timelike};
use md5::{Digest, Md5};

fn time_prefix(at: NaiveTime) -> String {
    format!("{:02}.{:02}.{:02}", at.hour(), at.minute(), at.second())
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Slug of a job posting, e.g. `14.03.59-<md5>.html`
pub fn job_slug(title: &str, at: NaiveTime) -> String {
    format!("{}-{}.html", time_prefix(at), md5_hex(title))
}

/// Stored name of an uploaded picture, keyed on the client's file name
pub fn upload_name(original_name: &str, ext: &str, at: NaiveTime) -> String {
    format!("{}-{}.{}", time_prefix(at), md5_hex(original_name), ext)
}

/// Current local time of day, used as the slug prefix
pub fn now() -> NaiveTime {
    chrono::Local::now().time()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_job_slug_format() {
        let slug = job_slug("hello", at(9, 5, 7));
        assert_eq!(slug, "09.05.07-5d41402abc4b2a76b9719d911017c592.html");
    }

    #[test]
    fn test_job_slug_is_deterministic() {
        let t = at(23, 59, 59);
        assert_eq!(job_slug("Rust developer", t), job_slug("Rust developer", t));
        assert_ne!(job_slug("Rust developer", t), job_slug("Go developer", t));
        assert_ne!(
            job_slug("Rust developer", t),
            job_slug("Rust developer", at(0, 0, 0))
        );
    }

    #[test]
    fn test_upload_name_keeps_extension() {
        let name = upload_name("photo.PNG", "png", at(12, 0, 1));
        assert!(name.starts_with("12.00.01-"));
        assert!(name.ends_with(".png"));
        // prefix + '-' + 32 hex chars + ".png"
        assert_eq!(name.len(), 8 + 1 + 32 + 4);
    }
}
