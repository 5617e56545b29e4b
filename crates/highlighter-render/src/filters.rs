//! ffmpeg filter chain construction.

use std::fmt;

use highlighter_ipc::Orientation;

/// A comma-joined chain of simple video or audio filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<String>,
}

impl FilterChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name=args` (or a bare `name` when `args` is empty).
    pub fn push(&mut self, name: &str, args: impl AsRef<str>) -> &mut Self {
        let args = args.as_ref();
        if args.is_empty() {
            self.filters.push(name.to_string());
        } else {
            self.filters.push(format!("{name}={args}"));
        }
        self
    }

    /// Whether no filters were added.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filters.join(","))
    }
}

/// Escape a value (typically a file path) for use as a filter option.
///
/// Backslashes become forward slashes, which ffmpeg accepts on every
/// platform; option and graph separators are backslash-escaped.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push('/'),
            ':' | '\'' | ',' | ';' | '[' | ']' | '=' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// Fit a decoded clip into the output frame.
///
/// Horizontal output letterboxes; vertical output fills and center crops.
pub fn fit_chain(width: u32, height: u32, fps: u32, orientation: Orientation) -> FilterChain {
    let mut chain = FilterChain::new();
    match orientation {
        Orientation::Horizontal => {
            chain
                .push(
                    "scale",
                    format!("{width}:{height}:force_original_aspect_ratio=decrease"),
                )
                .push(
                    "pad",
                    format!("{width}:{height}:(ow-iw)/2:(oh-ih)/2:black"),
                );
        }
        Orientation::Vertical => {
            chain
                .push(
                    "scale",
                    format!("{width}:{height}:force_original_aspect_ratio=increase"),
                )
                .push("crop", format!("{width}:{height}"));
        }
    }
    chain.push("setsar", "1").push("fps", fps.to_string());
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_joins_with_commas() {
        let mut chain = FilterChain::new();
        chain.push("format", "yuv420p").push("null", "");
        assert_eq!(chain.to_string(), "format=yuv420p,null");
    }

    #[test]
    fn test_escape_windows_path() {
        assert_eq!(
            escape_filter_value(r"C:\Users\me\subs.srt"),
            r"C\:/Users/me/subs.srt"
        );
        assert_eq!(escape_filter_value("it's,[a]"), r"it\'s\,\[a\]");
    }

    #[test]
    fn test_fit_chain_vertical_crops() {
        let chain = fit_chain(1080, 1920, 60, Orientation::Vertical).to_string();
        assert_eq!(
            chain,
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1,fps=60"
        );
    }

    #[test]
    fn test_fit_chain_horizontal_pads() {
        let chain = fit_chain(1280, 720, 30, Orientation::Horizontal).to_string();
        assert!(chain.starts_with("scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720"));
    }
}
