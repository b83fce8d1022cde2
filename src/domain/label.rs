use chrono::DateTime;
use chrono::Utc;

use crate::error::CoreError;

/// A tracker-scoped label (`spec.md` §3). `color`/`text_color` are stored as
/// `#rrggbb` hex; `text_color` is computed at creation time to keep label
/// badges legible (supplemented from `original_source` — see DESIGN.md).
#[derive(Debug, Clone)]
pub struct Label {
    pub id: i64,
    pub tracker_id: i64,
    pub name: String,
    pub color: String,
    pub text_color: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TicketLabel {
    pub ticket_id: i64,
    pub label_id: i64,
    /// The user who applied the label.
    pub user_id: i64,
    pub created: DateTime<Utc>,
}

pub fn validate_label_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.chars().count() > 50 {
        return Err(CoreError::validation(
            "name",
            "Label name must be 1-50 characters",
        ));
    }
    Ok(())
}

fn parse_hex_color(color: &str) -> Result<(u8, u8, u8), CoreError> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 {
        return Err(CoreError::validation("color", "Color must be #rrggbb"));
    }
    let channel = |slice: &str| {
        u8::from_str_radix(slice, 16)
            .map_err(|_| CoreError::validation("color", "Color must be valid hex"))
    };
    Ok((
        channel(&hex[0..2])?,
        channel(&hex[2..4])?,
        channel(&hex[4..6])?,
    ))
}

/// Picks black or white text for readability against `color`, using the
/// W3C relative-luminance threshold (mirrors the contrast heuristic in
/// `original_source/types/label.py`).
pub fn contrasting_text_color(color: &str) -> Result<&'static str, CoreError> {
    let (r, g, b) = parse_hex_color(color)?;
    let luminance =
        0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    Ok(if luminance > 140.0 { "#000000" } else { "#ffffff" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_readable_contrast() {
        assert_eq!(contrasting_text_color("#ffffff").unwrap(), "#000000");
        assert_eq!(contrasting_text_color("#000000").unwrap(), "#ffffff");
        assert_eq!(contrasting_text_color("fff200").unwrap(), "#000000");
    }

    #[test]
    fn rejects_malformed_color() {
        assert!(contrasting_text_color("#fff").is_err());
        assert!(contrasting_text_color("#gggggg").is_err());
    }
}
