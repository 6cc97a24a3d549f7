use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::table::Table;

/// Maximally distinct hex colors used to tell individuals apart.
/// Node fills, legend entries, and embedding points all draw from this
/// list in first-seen-individual order.
pub const PALETTE: [&str; 269] = [
    "#000000", "#FFFF00", "#1CE6FF", "#FF34FF", "#FF4A46", "#008941",
    "#006FA6", "#FFDBE5", "#0000A6", "#63FFAC", "#8FB0FF", "#5A0007",
    "#FEFFE6", "#4FC601", "#BA0900", "#6B7900", "#00C2A0", "#FFAA92",
    "#FF90C9", "#B903AA", "#D16100", "#DDEFFF", "#A1C299", "#0AA6D8",
    "#013349", "#00846F", "#372101", "#FFB500", "#C2FFED", "#A079BF",
    "#CC0744", "#C0B9B2", "#C2FF99", "#001E09", "#00489C", "#6F0062",
    "#0CBD66", "#EEC3FF", "#456D75", "#B77B68", "#7A87A1", "#788D66",
    "#885578", "#FAD09F", "#FF8A9A", "#D157A0", "#BEC459", "#456648",
    "#0086ED", "#886F4C", "#34362D", "#B4A8BD", "#00A6AA", "#452C2C",
    "#636375", "#A3C8C9", "#FF913F", "#938A81", "#575329", "#00FECF",
    "#B05B6F", "#8CD0FF", "#3B9700", "#04F757", "#C8A1A1", "#1E6E00",
    "#7900D7", "#A77500", "#6367A9", "#A05837", "#6B002C", "#772600",
    "#D790FF", "#9B9700", "#549E79", "#FFF69F", "#201625", "#72418F",
    "#BC23FF", "#99ADC0", "#3A2465", "#922329", "#5B4534", "#FDE8DC",
    "#404E55", "#0089A3", "#CB7E98", "#A4E804", "#324E72", "#6A3A4C",
    "#83AB58", "#001C1E", "#D1F7CE", "#004B28", "#C8D0F6", "#A3A489",
    "#806C66", "#222800", "#BF5650", "#E83000", "#66796D", "#DA007C",
    "#FF1A59", "#8ADBB4", "#1E0200", "#5B4E51", "#C895C5", "#320033",
    "#FF6832", "#66E1D3", "#CFCDAC", "#D0AC94", "#7ED379", "#012C58",
    "#7A7BFF", "#D68E01", "#353339", "#78AFA1", "#FEB2C6", "#75797C",
    "#837393", "#943A4D", "#B5F4FF", "#D2DCD5", "#9556BD", "#6A714A",
    "#001325", "#02525F", "#0AA3F7", "#E98176", "#DBD5DD", "#5EBCD1",
    "#3D4F44", "#7E6405", "#02684E", "#962B75", "#8D8546", "#9695C5",
    "#E773CE", "#D86A78", "#3E89BE", "#CA834E", "#518A87", "#5B113C",
    "#55813B", "#E704C4", "#00005F", "#A97399", "#4B8160", "#59738A",
    "#FF5DA7", "#F7C9BF", "#643127", "#513A01", "#6B94AA", "#51A058",
    "#A45B02", "#1D1702", "#E20027", "#E7AB63", "#4C6001", "#9C6966",
    "#64547B", "#97979E", "#006A66", "#391406", "#F4D749", "#0045D2",
    "#006C31", "#DDB6D0", "#7C6571", "#9FB2A4", "#00D891", "#15A08A",
    "#BC65E9", "#FFFFFE", "#C6DC99", "#203B3C", "#671190", "#6B3A64",
    "#F5E1FF", "#FFA0F2", "#CCAA35", "#374527", "#8BB400", "#797868",
    "#C6005A", "#3B000A", "#C86240", "#29607C", "#402334", "#7D5A44",
    "#CCB87C", "#B88183", "#AA5199", "#B5D6C3", "#A38469", "#9F94F0",
    "#A74571", "#B894A6", "#71BB8C", "#00B433", "#789EC9", "#6D80BA",
    "#953F00", "#5EFF03", "#E4FFFC", "#1BE177", "#BCB1E5", "#76912F",
    "#003109", "#0060CD", "#D20096", "#895563", "#29201D", "#5B3213",
    "#A76F42", "#89412E", "#1A3A2A", "#494B5A", "#A88C85", "#F4ABAA",
    "#A3F3AB", "#00C6C8", "#EA8B66", "#958A9F", "#BDC9D2", "#9FA064",
    "#BE4700", "#658188", "#83A485", "#453C23", "#47675D", "#3A3F00",
    "#061203", "#DFFB71", "#868E7E", "#98D058", "#6C8F7D", "#D7BFC2",
    "#3C3E6E", "#D83D66", "#2F5D9B", "#6C5E46", "#D25B88", "#5B656C",
    "#00B57F", "#545C46", "#866097", "#365D25", "#252F99", "#00CCFF",
    "#674E60", "#FC009C", "#92896B", "#A30059", "#7A4900", "#B79762",
    "#004D43", "#997D87", "#809693", "#1B4400", "#3B5DFF", "#4A3B53",
    "#FF2F80", "#61615A", "#000035", "#7B4F4B", "#300018",
];

/// Sample to individual mapping in file order.
pub struct SampleMap {
    samples: Vec<String>,
    map: HashMap<String, String>,
}

impl SampleMap {
    /// Build from a two-column table with `sample_id` and `individual`.
    /// A repeated sample keeps its first position but takes the last
    /// individual the file assigns it.
    pub fn from_table(table: &Table) -> Result<SampleMap, AppError> {
        let sample_idx = table.column_index("sample_id")?;
        let individual_idx = table.column_index("individual")?;

        let mut samples: Vec<String> = Vec::new();
        let mut map: HashMap<String, String> = HashMap::new();
        for row in &table.rows {
            let sample = row[sample_idx].clone();
            if !map.contains_key(&sample) {
                samples.push(sample.clone());
            }
            map.insert(sample, row[individual_idx].clone());
        }

        Ok(SampleMap { samples, map })
    }

    /// Individual a sample belongs to
    pub fn individual(&self, sample: &str) -> Result<&str, AppError> {
        self.map
            .get(sample)
            .map(|s| s.as_str())
            .ok_or_else(|| AppError::UnmappedSample(sample.to_string()))
    }

    /// Samples in file order
    pub fn samples(&self) -> &[String] {
        &self.samples
    }
}

/// Individual to color assignment, stable for a given sample map.
pub struct ColorMap {
    order: Vec<String>,
    colors: HashMap<String, &'static str>,
}

impl ColorMap {
    /// Walk the samples in file order and hand each newly seen individual
    /// the next palette slot. More individuals than slots is an error
    /// rather than a wrapped or repeated color.
    pub fn assign(sample_map: &SampleMap) -> Result<ColorMap, AppError> {
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for sample in sample_map.samples() {
            let individual = sample_map.individual(sample)?;
            if seen.insert(individual) {
                order.push(individual.to_string());
            }
        }

        if order.len() > PALETTE.len() {
            return Err(AppError::PaletteExhausted {
                individuals: order.len(),
                slots: PALETTE.len(),
            });
        }

        let colors = order
            .iter()
            .enumerate()
            .map(|(i, individual)| (individual.clone(), PALETTE[i]))
            .collect();

        Ok(ColorMap { order, colors })
    }

    /// Fill color for a sample, via its individual
    pub fn sample_color(&self, sample_map: &SampleMap, sample: &str) -> Result<&'static str, AppError> {
        let individual = sample_map.individual(sample)?;
        match self.colors.get(individual) {
            Some(color) => Ok(color),
            None => Err(AppError::UnmappedSample(sample.to_string())),
        }
    }

    /// (individual, color) pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.order
            .iter()
            .map(move |individual| (individual.as_str(), self.colors[individual.as_str()]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Parse a "#RRGGBB" hex color into its channel bytes.
pub fn hex_to_rgb(hex: &str) -> Result<(u8, u8, u8), AppError> {
    let invalid = || AppError::InvalidColor(hex.to_string());
    let raw = hex.strip_prefix('#').ok_or_else(invalid)?;
    if raw.len() != 6 || !raw.is_ascii() {
        return Err(invalid());
    }
    let r = u8::from_str_radix(&raw[0..2], 16).map_err(|_| invalid())?;
    let g = u8::from_str_radix(&raw[2..4], 16).map_err(|_| invalid())?;
    let b = u8::from_str_radix(&raw[4..6], 16).map_err(|_| invalid())?;
    Ok((r, g, b))
}

/// Font color that stays readable on a fill color: white on dark fills,
/// black otherwise. Lightness is the HSL (max+min)/2 form, not a
/// perceptual weighting.
pub fn font_color(hex: &str) -> Result<&'static str, AppError> {
    let (r, g, b) = hex_to_rgb(hex)?;
    let channels = [r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0];
    let max = channels.iter().cloned().fold(f64::MIN, f64::max);
    let min = channels.iter().cloned().fold(f64::MAX, f64::min);
    let lightness = (max + min) / 2.0;
    if lightness <= 0.4 {
        Ok("white")
    } else {
        Ok("black")
    }
}

/// Point opacity for the embedding view. Samples whose matrix row carries
/// strong signal overall are drawn half transparent so the weakly covered
/// ones stand out.
pub fn alpha_for(mean_abs_lod: f64, threshold: f64) -> f64 {
    if mean_abs_lod >= threshold {
        0.5
    } else {
        0.99
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn sample_map_from(content: &str) -> SampleMap {
        let file = create_test_file(content);
        let table = Table::from_tsv(file.path()).unwrap();
        SampleMap::from_table(&table).unwrap()
    }

    #[test]
    fn test_palette_entries_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for color in PALETTE {
            assert!(seen.insert(color), "duplicate palette entry {color}");
            hex_to_rgb(color).unwrap();
        }
        assert_eq!(PALETTE.len(), 269);
    }

    #[test]
    fn test_sample_map_keeps_file_order_and_last_mapping() {
        let map = sample_map_from(
            "sample_id\tindividual\nS1\tInd1\nS2\tInd2\nS1\tInd3\n",
        );
        assert_eq!(map.samples(), ["S1", "S2"]);
        assert_eq!(map.individual("S1").unwrap(), "Ind3");
        assert!(matches!(
            map.individual("S9"),
            Err(AppError::UnmappedSample(_))
        ));
    }

    #[test]
    fn test_color_assignment_first_seen_order() {
        let map = sample_map_from(
            "sample_id\tindividual\nS1\tInd1\nS2\tInd2\nS3\tInd1\nS4\tInd3\n",
        );
        let colors = ColorMap::assign(&map).unwrap();
        let assigned: Vec<(&str, &str)> = colors.iter().collect();
        assert_eq!(
            assigned,
            vec![
                ("Ind1", PALETTE[0]),
                ("Ind2", PALETTE[1]),
                ("Ind3", PALETTE[2]),
            ]
        );
        assert_eq!(colors.sample_color(&map, "S3").unwrap(), PALETTE[0]);
    }

    #[test]
    fn test_color_assignment_is_deterministic() {
        let map = sample_map_from("sample_id\tindividual\nS1\tInd1\nS2\tInd2\n");
        let first = ColorMap::assign(&map).unwrap();
        let second = ColorMap::assign(&map).unwrap();
        let a: Vec<_> = first.iter().collect();
        let b: Vec<_> = second.iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_color_reuse_while_slots_remain() {
        let mut content = String::from("sample_id\tindividual\n");
        for i in 0..PALETTE.len() {
            content.push_str(&format!("S{i}\tInd{i}\n"));
        }
        let map = sample_map_from(&content);
        let colors = ColorMap::assign(&map).unwrap();
        let mut seen = std::collections::HashSet::new();
        for (_, color) in colors.iter() {
            assert!(seen.insert(color));
        }
        assert_eq!(colors.len(), PALETTE.len());
    }

    #[test]
    fn test_palette_exhaustion_is_an_error() {
        let mut content = String::from("sample_id\tindividual\n");
        for i in 0..(PALETTE.len() + 1) {
            content.push_str(&format!("S{i}\tInd{i}\n"));
        }
        let map = sample_map_from(&content);
        match ColorMap::assign(&map) {
            Err(AppError::PaletteExhausted { individuals, slots }) => {
                assert_eq!(individuals, PALETTE.len() + 1);
                assert_eq!(slots, PALETTE.len());
            }
            other => panic!("expected palette exhaustion, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#000000").unwrap(), (0, 0, 0));
        assert_eq!(hex_to_rgb("#FF34FF").unwrap(), (255, 52, 255));
        assert!(matches!(hex_to_rgb("FFFFFF"), Err(AppError::InvalidColor(_))));
        assert!(matches!(hex_to_rgb("#12345"), Err(AppError::InvalidColor(_))));
        assert!(matches!(hex_to_rgb("#GGGGGG"), Err(AppError::InvalidColor(_))));
    }

    #[test]
    fn test_font_color_white_on_dark_fills() {
        assert_eq!(font_color("#000000").unwrap(), "white");
        assert_eq!(font_color("#0000A6").unwrap(), "white");
        assert_eq!(font_color("#5A0007").unwrap(), "white");
    }

    #[test]
    fn test_font_color_black_on_light_fills() {
        assert_eq!(font_color("#FFFF00").unwrap(), "black");
        assert_eq!(font_color("#FFFFFE").unwrap(), "black");
        // Pure red sits at lightness 0.5, above the 0.4 cutoff
        assert_eq!(font_color("#FF0000").unwrap(), "black");
    }

    #[test]
    fn test_alpha_for_threshold_boundary() {
        assert_eq!(alpha_for(5.0, 5.0), 0.5);
        assert_eq!(alpha_for(7.3, 5.0), 0.5);
        assert_eq!(alpha_for(4.99, 5.0), 0.99);
        assert_eq!(alpha_for(0.0, 5.0), 0.99);
    }
}
