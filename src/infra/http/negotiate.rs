//! `Accept-Encoding` negotiation against the variants of a cached entry.

use bytes::Bytes;

use crate::cache::CachedEntry;

/// Which pre-computed buffer to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Brotli,
    Gzip,
    Raw,
}

impl Variant {
    /// Value for `Content-Encoding`, absent for the raw bytes.
    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            Variant::Brotli => Some("br"),
            Variant::Gzip => Some("gzip"),
            Variant::Raw => None,
        }
    }

    pub fn label(self) -> &'static str {
        self.content_encoding().unwrap_or("identity")
    }

    /// The buffer for this variant. Falls back to raw if the variant is absent.
    pub fn body(self, entry: &CachedEntry) -> Bytes {
        let chosen = match self {
            Variant::Brotli => entry.brotli.as_ref(),
            Variant::Gzip => entry.gzip.as_ref(),
            Variant::Raw => None,
        };
        chosen.unwrap_or(&entry.raw).clone()
    }
}

/// Pick brotli, then gzip, then raw.
///
/// Tokens are matched by substring on the raw header value; `q=` weights are
/// not parsed. A variant is only chosen when the entry actually carries it.
pub fn select_variant(accept_encoding: Option<&str>, entry: &CachedEntry) -> Variant {
    let header = accept_encoding.unwrap_or_default();

    if header.contains("br") && entry.brotli.is_some() {
        Variant::Brotli
    } else if header.contains("gzip") && entry.gzip.is_some() {
        Variant::Gzip
    } else {
        Variant::Raw
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::cache::compress;

    fn entry(filename: &str) -> CachedEntry {
        let variants = compress(filename, Bytes::from_static(b"body { color: red; }"));
        CachedEntry::new(
            filename.to_string(),
            filename.to_string(),
            SystemTime::UNIX_EPOCH,
            variants,
        )
    }

    #[test]
    fn brotli_wins_over_gzip() {
        let entry = entry("site.css");
        assert_eq!(select_variant(Some("gzip, br"), &entry), Variant::Brotli);
        assert_eq!(select_variant(Some("br;q=0.1, gzip"), &entry), Variant::Brotli);
    }

    #[test]
    fn gzip_when_brotli_not_accepted() {
        let entry = entry("site.css");
        assert_eq!(select_variant(Some("gzip, deflate"), &entry), Variant::Gzip);
    }

    #[test]
    fn raw_without_header_or_known_token() {
        let entry = entry("site.css");
        assert_eq!(select_variant(None, &entry), Variant::Raw);
        assert_eq!(select_variant(Some("deflate"), &entry), Variant::Raw);
        assert_eq!(select_variant(Some("identity"), &entry), Variant::Raw);
    }

    #[test]
    fn raw_when_entry_has_no_compressed_variants() {
        let entry = entry("logo.png");
        assert_eq!(select_variant(Some("gzip, br"), &entry), Variant::Raw);
    }

    #[test]
    fn gzip_falls_through_when_only_gzip_present() {
        let mut entry = entry("site.css");
        entry.brotli = None;
        assert_eq!(select_variant(Some("br, gzip"), &entry), Variant::Gzip);
    }

    #[test]
    fn selection_is_deterministic() {
        let entry = entry("site.css");
        let first = select_variant(Some("gzip"), &entry);
        for _ in 0..10 {
            assert_eq!(select_variant(Some("gzip"), &entry), first);
        }
    }

    #[test]
    fn body_matches_variant() {
        let entry = entry("site.css");
        assert_eq!(Variant::Raw.body(&entry), entry.raw);
        assert_eq!(Some(Variant::Gzip.body(&entry)), entry.gzip);
        assert_eq!(Some(Variant::Brotli.body(&entry)), entry.brotli);
    }
}
