//! Form body parsing module
//!
//! Decodes the `application/x-www-form-urlencoded` body posted by the index page.

use url::form_urlencoded;

/// Fields of the playback form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayForm {
    /// Selected video file name
    pub video: String,
    /// Number of players to open
    pub count: u32,
}

impl PlayForm {
    /// Parse and validate a form body; `count` must be within `1..=max_count`
    pub fn parse(body: &[u8], max_count: u32) -> Result<Self, String> {
        let mut video = None;
        let mut count = None;

        for (key, value) in form_urlencoded::parse(body) {
            match key.as_ref() {
                "video" => video = Some(value.into_owned()),
                "count" => count = Some(value.into_owned()),
                _ => {}
            }
        }

        let video = video
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing field 'video'".to_string())?;
        let count_str = count.ok_or_else(|| "missing field 'count'".to_string())?;
        let count = count_str
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid count '{count_str}': {e}"))?;

        if count == 0 || count > max_count {
            return Err(format!("count must be between 1 and {max_count}"));
        }

        Ok(Self { video, count })
    }
}
