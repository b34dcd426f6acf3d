//! EXIF 読み取り（撮影日時・GPS）

use exif::{Exif, In, Tag, Value};
use std::io::Cursor;

pub fn read_exif(bytes: &[u8]) -> Option<Exif> {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
}

/// 撮影日時（DateTimeOriginal → DateTime の順）
pub fn extract_date(exif: &Exif) -> Option<String> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .find_map(|tag| exif.get_field(tag, In::PRIMARY))
        .map(|field| field.display_value().to_string())
}

/// GPS座標（緯度, 経度）
pub fn extract_gps(exif: &Exif) -> Option<(f64, f64)> {
    let lat = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let lon = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some((lat, lon))
}

fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let degrees = match &field.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0
        }
        _ => return None,
    };

    let sign = match exif.get_field(ref_tag, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Ascii(refs)) if refs.first().and_then(|r| r.first()) == Some(&negative) => -1.0,
        _ => 1.0,
    };

    degrees.is_finite().then_some(sign * degrees)
}
