use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A video post as served by the remote `posts` table.
///
/// Identity is `id` alone; two posts with the same id are the same entity even
/// when counters differ between fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "post_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "video", default, deserialize_with = "null_as_default")]
    pub video_uri: String,
    #[serde(rename = "thumbnail_url", default)]
    pub thumbnail_uri: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub view_total: u64,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub private: bool,
}

/// Nullable columns arrive as explicit `null`; treat that like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Post {
    pub fn new(id: impl Into<String>, title: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            video_uri: format!("https://media.invalid/{id}.mp4"),
            id,
            title: title.into(),
            thumbnail_uri: None,
            like_total: 0,
            view_total: 0,
            owner_id: owner_id.into(),
            created_at: None,
            private: false,
        }
    }

    pub fn has_video(&self) -> bool {
        !self.video_uri.trim().is_empty()
    }

    pub fn likes_label(&self) -> String {
        format_count(self.like_total)
    }

    pub fn views_label(&self) -> String {
        format_count(self.view_total)
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Post {}

/// Compact counter label used next to the like and view icons.
///
/// Ten million and up render in millions, ten thousand and up in thousands,
/// anything smaller keeps every digit with `.` as the thousands separator.
pub fn format_count(value: u64) -> String {
    if value >= 10_000_000 {
        format!("{}M", round_div(value, 1_000_000))
    } else if value >= 10_000 {
        format!("{}k", round_div(value, 1_000))
    } else {
        let digits = value.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (idx, ch) in digits.chars().enumerate() {
            if idx > 0 && (digits.len() - idx) % 3 == 0 {
                out.push('.');
            }
            out.push(ch);
        }
        out
    }
}

fn round_div(value: u64, unit: u64) -> u64 {
    (value + unit / 2) / unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_remote_row() {
        let row = r#"{
            "post_id": "6d1f0e4e-1",
            "user_id": "owner-1",
            "title": "Sunset",
            "video": "https://cdn.test/v.mp4",
            "thumbnail_url": null,
            "like_total": 12,
            "created_at": "2024-05-01T10:00:00+00:00",
            "private": false
        }"#;
        let post: Post = serde_json::from_str(row).unwrap();
        assert_eq!(post.id, "6d1f0e4e-1");
        assert_eq!(post.owner_id, "owner-1");
        assert_eq!(post.video_uri, "https://cdn.test/v.mp4");
        assert_eq!(post.like_total, 12);
        assert_eq!(post.view_total, 0);
        assert!(post.created_at.is_some());
        assert!(!post.private);
    }

    #[test]
    fn missing_video_is_empty_uri() {
        let post: Post = serde_json::from_str(r#"{"post_id": "a", "user_id": "u"}"#).unwrap();
        assert!(!post.has_video());
    }

    #[test]
    fn null_columns_fall_back_to_defaults() {
        let rows = r#"[
            {"post_id": "a", "user_id": "u", "title": null, "video": null,
             "like_total": null, "view_total": null, "private": null},
            {"post_id": "b", "user_id": "u", "video": "https://cdn.test/b.mp4",
             "like_total": 3, "view_total": 40}
        ]"#;
        let posts: Vec<Post> = serde_json::from_str(rows).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "");
        assert!(!posts[0].has_video());
        assert_eq!(posts[0].like_total, 0);
        assert_eq!(posts[0].view_total, 0);
        assert!(!posts[0].private);
        assert_eq!(posts[1].view_total, 40);
    }

    #[test]
    fn identity_ignores_counters() {
        let mut a = Post::new("p1", "one", "u1");
        let b = Post::new("p1", "renamed", "u1");
        a.like_total = 99;
        assert_eq!(a, b);
    }

    #[test]
    fn formats_counts() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234), "1.234");
        assert_eq!(format_count(9_999), "9.999");
        assert_eq!(format_count(12_400), "12k");
        assert_eq!(format_count(1_234_567), "1235k");
        assert_eq!(format_count(25_000_000), "25M");
    }
}
