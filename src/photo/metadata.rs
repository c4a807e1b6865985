use chrono::{DateTime, NaiveDate, Utc};
use std::io::Cursor;

use crate::geo::Coord;

/// What the import pipeline needs from a photo's EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub captured_at: Option<DateTime<Utc>>,
    /// `"<make> <model>"`, or the make alone.
    pub device: Option<String>,
    pub location: Option<Coord>,
}

/// Extract metadata from an encoded image. Images without readable EXIF
/// yield empty metadata.
pub fn read_metadata(bytes: &[u8]) -> PhotoMetadata {
    let mut cursor = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => from_exif(&exif),
        Err(e) => {
            tracing::debug!(error = %e, "No readable EXIF");
            PhotoMetadata::default()
        }
    }
}

fn from_exif(exif: &exif::Exif) -> PhotoMetadata {
    let make = ascii_field(exif, exif::Tag::Make);
    let model = ascii_field(exif, exif::Tag::Model);
    let device = match (make, model) {
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (Some(make), None) => Some(make),
        _ => None,
    };

    PhotoMetadata {
        captured_at: captured_at(exif),
        device,
        location: location(exif),
    }
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).trim_matches(char::from(0)).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// `DateTimeOriginal`, taken as UTC.
fn captured_at(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let field = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;
    let raw = match field.value {
        exif::Value::Ascii(ref values) => values.first()?,
        _ => return None,
    };
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
        .map(|naive| naive.and_utc())
}

fn location(exif: &exif::Exif) -> Option<Coord> {
    let lat = dms_field(exif, exif::Tag::GPSLatitude)?;
    let lng = dms_field(exif, exif::Tag::GPSLongitude)?;

    // Missing refs default to north/east
    let lat_ref = ascii_field(exif, exif::Tag::GPSLatitudeRef).unwrap_or_else(|| "N".to_string());
    let lng_ref = ascii_field(exif, exif::Tag::GPSLongitudeRef).unwrap_or_else(|| "E".to_string());

    let lat = if lat_ref.contains('S') { -lat } else { lat };
    let lng = if lng_ref.contains('W') { -lng } else { lng };

    // Cameras without a fix write zeros
    if lat == 0.0 || lng == 0.0 {
        return None;
    }
    Some(Coord { lat, lng })
}

fn dms_field(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Rational(ref v) if v.len() >= 3 => {
            Some(dms_to_decimal(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()))
        }
        _ => None,
    }
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use exif::experimental::Writer;
    use exif::{Field, In, Rational, Tag, Value};

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    fn dms(tag: Tag, degrees: u32, minutes: u32, seconds: u32) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                Rational::from((degrees, 1)),
                Rational::from((minutes, 1)),
                Rational::from((seconds, 1)),
            ]),
        }
    }

    fn tiff(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_device_and_capture_time() {
        let bytes = tiff(&[
            ascii(Tag::Make, "Apple"),
            ascii(Tag::Model, "iPhone 11"),
            ascii(Tag::DateTimeOriginal, "2019:06:01 09:30:00"),
        ]);
        let metadata = read_metadata(&bytes);
        assert_eq!(metadata.device.as_deref(), Some("Apple iPhone 11"));
        assert_eq!(
            metadata.captured_at,
            Some(Utc.with_ymd_and_hms(2019, 6, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(metadata.location, None);
    }

    #[test]
    fn test_make_without_model() {
        let bytes = tiff(&[ascii(Tag::Make, "NIKON ")]);
        assert_eq!(read_metadata(&bytes).device.as_deref(), Some("NIKON"));
    }

    #[test]
    fn test_gps_location() {
        let bytes = tiff(&[
            ascii(Tag::Make, "Apple"),
            dms(Tag::GPSLatitude, 33, 51, 36),
            ascii(Tag::GPSLatitudeRef, "S"),
            dms(Tag::GPSLongitude, 151, 12, 36),
            ascii(Tag::GPSLongitudeRef, "E"),
        ]);
        let location = read_metadata(&bytes).location.unwrap();
        assert!((location.lat - -33.86).abs() < 1e-9);
        assert!((location.lng - 151.21).abs() < 1e-9);
    }

    #[test]
    fn test_zero_coordinate_is_discarded() {
        let bytes = tiff(&[
            ascii(Tag::Make, "Apple"),
            dms(Tag::GPSLatitude, 0, 0, 0),
            dms(Tag::GPSLongitude, 151, 12, 36),
        ]);
        assert_eq!(read_metadata(&bytes).location, None);
    }

    #[test]
    fn test_garbage_yields_empty_metadata() {
        assert_eq!(read_metadata(b"not an image"), PhotoMetadata::default());
    }

    #[test]
    fn test_dms_to_decimal() {
        assert!((dms_to_decimal(10.0, 30.0, 0.0) - 10.5).abs() < 1e-9);
    }
}
