//! BUFR Table A: data category names.
//!
//! These are fixed by the WMO common code tables, so they live in code
//! rather than in a table resource.

/// Name for a data category code, or `None` for codes the common tables
/// do not define.
pub fn data_category_name(category: i32) -> Option<&'static str> {
    let name = match category {
        0 => "Surface data - land",
        1 => "Surface data - sea",
        2 => "Vertical soundings (other than satellite)",
        3 => "Vertical soundings (satellite)",
        4 => "Single level upper-air data (other than satellite)",
        5 => "Single level upper-air data (satellite)",
        6 => "Radar data",
        7 => "Synoptic features",
        8 => "Physical/chemical constituents",
        9 => "Dispersal and transport",
        10 => "Radiological data",
        11 => "BUFR tables, complete replacement or update",
        12 => "Surface data (satellite)",
        13 => "Forecasts",
        14 => "Warnings",
        20 => "Status information",
        21 => "Radiances (satellite measured)",
        22 => "Radar (satellite) but not altimeter and scatterometer",
        23 => "Lidar (satellite)",
        24 => "Scatterometry (satellite)",
        25 => "Altimetry (satellite)",
        26 => "Spectrometry (satellite)",
        27 => "Gravity measurement (satellite)",
        28 => "Precision orbit (satellite)",
        29 => "Space environment (satellite)",
        30 => "Calibration datasets (satellite)",
        31 => "Oceanographic data",
        101 => "Image data (satellite)",
        255 => "Other category",
        _ => return None,
    };
    Some(name)
}

/// Like [`data_category_name`], with a formatted placeholder for unknown
/// codes.
pub fn data_category_description(category: i32) -> String {
    match data_category_name(category) {
        Some(name) => name.to_string(),
        None => format!("Data category {}", category),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories() {
        assert_eq!(data_category_name(0), Some("Surface data - land"));
        assert_eq!(data_category_name(2), Some("Vertical soundings (other than satellite)"));
        assert_eq!(data_category_name(31), Some("Oceanographic data"));
        assert_eq!(data_category_name(255), Some("Other category"));
    }

    #[test]
    fn test_unknown_categories() {
        assert_eq!(data_category_name(15), None);
        assert_eq!(data_category_name(-1), None);
        assert_eq!(data_category_description(15), "Data category 15");
        assert_eq!(data_category_description(3), "Vertical soundings (satellite)");
    }
}
