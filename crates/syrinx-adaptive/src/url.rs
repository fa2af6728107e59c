//! Segment address resolution.
//!
//! A segment's location in a manifest is an absolute URL, a reference
//! relative to some base, or a template carrying `$Number$`-style variables
//! that are only known at fetch time. [`SegmentUrl`] parses the raw string
//! once and resolves it against a [`UrlContext`] per request.

use url::Url;

use crate::error::{AdaptiveError, AdaptiveResult};

/// One parsed piece of a segment URL.
#[derive(Clone, Debug, PartialEq, Eq)]
enum UrlPart {
    Literal(String),
    /// `$Number$`, optionally `$Number%0Nd$` zero-padded.
    Number { width: Option<usize> },
    /// `$Time$` — timeline start time in timescale units.
    Time,
    /// `$Bandwidth$` — the representation's advertised bandwidth.
    Bandwidth,
    /// `$RepresentationID$`.
    RepresentationId,
}

/// Substitution context for one segment request.
#[derive(Clone, Debug)]
pub struct UrlContext<'a> {
    pub base: Option<&'a Url>,
    pub number: u64,
    pub time: u64,
    pub bandwidth_bps: u64,
    pub representation_id: &'a str,
}

/// A segment address: absolute, relative, or templated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentUrl {
    parts: Vec<UrlPart>,
}

impl SegmentUrl {
    /// Parse a raw manifest string.
    ///
    /// Recognized identifiers are `$Number$` (with optional `%0Nd` padding),
    /// `$Time$`, `$Bandwidth$` and `$RepresentationID$`; `$$` escapes a
    /// literal dollar sign. Unrecognized `$...$` runs are kept literal.
    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(start) = rest.find('$') {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            let Some(end) = after.find('$') else {
                // Unterminated '$': keep the remainder literal.
                literal.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let ident = &after[..end];
            let part = match parse_identifier(ident) {
                Some(part) => part,
                None => {
                    literal.push('$');
                    literal.push_str(ident);
                    literal.push('$');
                    rest = &after[end + 1..];
                    continue;
                }
            };

            if !literal.is_empty() {
                parts.push(UrlPart::Literal(std::mem::take(&mut literal)));
            }
            if let Some(part) = part_or_escape(part, &mut literal) {
                parts.push(part);
            }
            rest = &after[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(UrlPart::Literal(literal));
        }

        Self { parts }
    }

    /// Whether any template variable needs substitution.
    pub fn is_template(&self) -> bool {
        self.parts
            .iter()
            .any(|p| !matches!(p, UrlPart::Literal(_)))
    }

    /// Substitute template variables and resolve to an absolute URL.
    pub fn resolve(&self, ctx: &UrlContext<'_>) -> AdaptiveResult<Url> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                UrlPart::Literal(s) => out.push_str(s),
                UrlPart::Number { width: None } => out.push_str(&ctx.number.to_string()),
                UrlPart::Number { width: Some(w) } => {
                    out.push_str(&format!("{:0width$}", ctx.number, width = *w));
                }
                UrlPart::Time => out.push_str(&ctx.time.to_string()),
                UrlPart::Bandwidth => out.push_str(&ctx.bandwidth_bps.to_string()),
                UrlPart::RepresentationId => out.push_str(ctx.representation_id),
            }
        }

        if let Ok(url) = Url::parse(&out) {
            return Ok(url);
        }

        let base = ctx
            .base
            .ok_or_else(|| AdaptiveError::NoBaseUrl(out.clone()))?;
        base.join(&out).map_err(|e| {
            if self.is_template() {
                AdaptiveError::Template(format!("{out}: {e}"))
            } else {
                AdaptiveError::InvalidUrl(format!("{out}: {e}"))
            }
        })
    }
}

impl From<&str> for SegmentUrl {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// `Some(part)` passes the part through; the `$$` escape instead appends to
/// the pending literal and yields nothing.
fn part_or_escape(part: UrlPart, literal: &mut String) -> Option<UrlPart> {
    if let UrlPart::Literal(s) = &part {
        literal.push_str(s);
        return None;
    }
    Some(part)
}

fn parse_identifier(ident: &str) -> Option<UrlPart> {
    match ident {
        "" => return Some(UrlPart::Literal("$".to_string())),
        "Time" => return Some(UrlPart::Time),
        "Bandwidth" => return Some(UrlPart::Bandwidth),
        "RepresentationID" => return Some(UrlPart::RepresentationId),
        "Number" => return Some(UrlPart::Number { width: None }),
        _ => {}
    }

    // $Number%05d$
    let fmt = ident.strip_prefix("Number%")?;
    let digits = fmt.strip_prefix('0')?.strip_suffix('d')?;
    let width: usize = digits.parse().ok()?;
    Some(UrlPart::Number { width: Some(width) })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn ctx(base: Option<&Url>) -> UrlContext<'_> {
        UrlContext {
            base,
            number: 42,
            time: 900_000,
            bandwidth_bps: 500_000,
            representation_id: "audio-hi",
        }
    }

    #[rstest]
    #[case("https://cdn.example/seg-$Number$.m4s", "https://cdn.example/seg-42.m4s")]
    #[case(
        "https://cdn.example/$RepresentationID$/segment_$Number%05d$.m4s",
        "https://cdn.example/audio-hi/segment_00042.m4s"
    )]
    #[case(
        "https://cdn.example/$Bandwidth$/t$Time$.m4s",
        "https://cdn.example/500000/t900000.m4s"
    )]
    #[case(
        "https://cdn.example/price$$list/$Number$",
        "https://cdn.example/price$list/42"
    )]
    #[case(
        "https://cdn.example/$Unknown$/x.m4s",
        "https://cdn.example/$Unknown$/x.m4s"
    )]
    fn absolute_resolution(#[case] raw: &str, #[case] expected: &str) {
        let url = SegmentUrl::parse(raw).resolve(&ctx(None)).unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn relative_joins_against_base() {
        let base = Url::parse("https://cdn.example/live/manifest.mpd").unwrap();
        let url = SegmentUrl::parse("seg-$Number$.m4s")
            .resolve(&ctx(Some(&base)))
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/live/seg-42.m4s");
    }

    #[test]
    fn relative_without_base_is_an_error() {
        let err = SegmentUrl::parse("seg-$Number$.m4s")
            .resolve(&ctx(None))
            .unwrap_err();
        assert!(matches!(err, AdaptiveError::NoBaseUrl(_)));
    }

    #[test]
    fn template_detection() {
        assert!(SegmentUrl::parse("seg-$Number$.m4s").is_template());
        assert!(!SegmentUrl::parse("seg-7.m4s").is_template());
        assert!(!SegmentUrl::parse("price$$list.m4s").is_template());
    }

    #[test]
    fn unterminated_dollar_stays_literal() {
        let base = Url::parse("https://cdn.example/").unwrap();
        let url = SegmentUrl::parse("odd$name.m4s")
            .resolve(&ctx(Some(&base)))
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/odd$name.m4s");
    }
}
