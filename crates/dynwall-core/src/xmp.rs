//! XMP packet carrying the wallpaper metadata inside the packaged file.
//!
//! The metadata list is serialized as a JSON array, base64-encoded and stored
//! in a single `rdf:Description` attribute named after the wallpaper kind.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::metadata::{MetaDataKind, WallpaperMetaData};

const PLASMA_NS: &str = "http://www.kde.org/plasma/1.0/";

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"plasma:dynamic-wallpaper-(solar|day-night)\s*=\s*"([^"]*)""#)
        .expect("valid XMP attribute regex")
});

fn attribute_name(kind: MetaDataKind) -> &'static str {
    match kind {
        MetaDataKind::Solar => "plasma:dynamic-wallpaper-solar",
        MetaDataKind::DayNight => "plasma:dynamic-wallpaper-day-night",
    }
}

/// Build the XMP packet for `meta_data`.
///
/// The attribute name follows the kind of the first record; callers must not
/// mix kinds.
pub fn render(meta_data: &[WallpaperMetaData]) -> String {
    let kind = meta_data
        .first()
        .map(WallpaperMetaData::kind)
        .unwrap_or(MetaDataKind::Solar);
    let array = Value::Array(meta_data.iter().map(WallpaperMetaData::to_json).collect());
    let payload = STANDARD.encode(array.to_string());

    format!(
        concat!(
            "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n",
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n",
            " <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "  <rdf:Description rdf:about=\"\" xmlns:plasma=\"{ns}\" {attr}=\"{payload}\"/>\n",
            " </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end=\"w\"?>\n",
        ),
        ns = PLASMA_NS,
        attr = attribute_name(kind),
        payload = payload,
    )
}

/// Extract metadata from an XMP packet.
///
/// Only valid records are returned. A packet without a usable attribute
/// yields an empty list.
pub fn parse(xmp: &str) -> Vec<WallpaperMetaData> {
    for caps in ATTRIBUTE_RE.captures_iter(xmp) {
        let payload = &caps[2];
        if payload.is_empty() {
            continue;
        }
        let kind = match &caps[1] {
            "solar" => MetaDataKind::Solar,
            _ => MetaDataKind::DayNight,
        };

        let Ok(bytes) = STANDARD.decode(payload) else {
            warn!(%kind, "XMP metadata attribute is not valid base64");
            return Vec::new();
        };
        let Ok(Value::Array(records)) = serde_json::from_slice::<Value>(&bytes) else {
            warn!(%kind, "XMP metadata attribute does not hold a JSON array");
            return Vec::new();
        };

        return records
            .iter()
            .map(|record| WallpaperMetaData::from_json(kind, record))
            .filter(WallpaperMetaData::is_valid)
            .collect();
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{CrossFadeMode, DayNightMetaData, SolarMetaData, TimeOfDay};

    fn solar(time: f64, index: u32) -> WallpaperMetaData {
        SolarMetaData {
            cross_fade: Some(CrossFadeMode::CrossFade),
            time: Some(time),
            index: Some(index),
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn rendered_packet_can_be_parsed_back() {
        let meta_data = vec![solar(0.25, 0), solar(0.75, 1)];
        let xmp = render(&meta_data);
        assert!(xmp.contains("plasma:dynamic-wallpaper-solar=\""));
        assert_eq!(parse(&xmp), meta_data);
    }

    #[test]
    fn day_night_uses_its_own_attribute() {
        let meta_data: Vec<WallpaperMetaData> = vec![
            DayNightMetaData::new(TimeOfDay::Day, 0).into(),
            DayNightMetaData::new(TimeOfDay::Night, 1).into(),
        ];
        let xmp = render(&meta_data);
        assert!(xmp.contains("plasma:dynamic-wallpaper-day-night=\""));
        assert_eq!(parse(&xmp), meta_data);
    }

    #[test]
    fn invalid_records_are_dropped() {
        let payload = STANDARD.encode(r#"[{"Time": 0.5, "Index": 0}, {"Time": 0.5}]"#);
        let xmp = format!(r#"<rdf:Description plasma:dynamic-wallpaper-solar="{payload}"/>"#);
        let expected = WallpaperMetaData::Solar(SolarMetaData {
            time: Some(0.5),
            index: Some(0),
            ..Default::default()
        });
        assert_eq!(parse(&xmp), vec![expected]);
    }

    #[test]
    fn empty_attribute_is_skipped() {
        let payload = STANDARD.encode(r#"[{"Time": 0.1, "Index": 3}]"#);
        let xmp = format!(
            r#"<rdf:Description plasma:dynamic-wallpaper-solar=""/><rdf:Description plasma:dynamic-wallpaper-solar="{payload}"/>"#
        );
        assert_eq!(parse(&xmp).len(), 1);
    }

    #[test]
    fn attribute_pattern_matches_both_kinds() {
        for kind in [MetaDataKind::Solar, MetaDataKind::DayNight] {
            let attr = format!(r#"{}="abc""#, attribute_name(kind));
            let caps = ATTRIBUTE_RE.captures(&attr).unwrap();
            assert_eq!(&caps[1], kind.to_string());
            assert_eq!(&caps[2], "abc");
        }
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("<x:xmpmeta/>").is_empty());
        assert!(parse(r#"plasma:dynamic-wallpaper-solar="!!!""#).is_empty());
        let not_array = STANDARD.encode("{}");
        assert!(parse(&format!(r#"plasma:dynamic-wallpaper-solar="{not_array}""#)).is_empty());
    }
}
