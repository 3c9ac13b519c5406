//! Parser for the line-oriented map description language.
//!
//! ```text
//! map
//!   marker
//!     "The Statue of Liberty"
//!     [40, -70]
//!   plz
//!   button "Parks"
//!     shape
//!       #0f0
//!       [40.77, -73.98]
//!       [40.80, -73.95]
//!       [40.76, -73.93]
//!     plz
//!   plz
//! plz
//! ```
//!
//! Each trimmed line is handled in order:
//!
//! - a line starting with `#` sets the current color;
//! - a double-quoted substring sets the current label and is removed before
//!   keywords are matched;
//! - a line holding `[`, `,` and `]` pushes one coordinate when it carries
//!   exactly two numbers;
//! - otherwise the whitespace-split tokens are matched case-insensitively
//!   against `map`, `button`/`btn`, `marker`, `line`, `shape` and
//!   `plz`/`please`.
//!
//! Parsing stops once the outer `map` scope closes. Running out of input
//! inside an open scope is not an error.

use crate::error::{MapError, Result};
use crate::item::{GeoItem, Geometry, PropertyMap};
use mapplz_types::geo::LatLng;
use serde_json::Value;

/// Property key holding a button's index on its layer records.
pub const BUTTON_KEY: &str = "button";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TopLevel,
    Map,
    Button,
    Marker,
    Line,
    Shape,
}

/// A toggle button and the layers it controls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Button {
    pub label: Option<String>,
    pub layers: Vec<GeoItem>,
}

/// Parsed map description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapDocument {
    /// Records declared directly inside `map`, in source order.
    pub items: Vec<GeoItem>,
    pub buttons: Vec<Button>,
}

impl MapDocument {
    /// Total number of records, button layers included.
    pub fn len(&self) -> usize {
        self.items.len() + self.buttons.iter().map(|b| b.layers.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the document: top-level records first, then each button's
    /// layers tagged with the button index under [`BUTTON_KEY`].
    pub fn into_items(self) -> Vec<GeoItem> {
        let mut items = self.items;
        for (index, button) in self.buttons.into_iter().enumerate() {
            for mut layer in button.layers {
                let mut tag = PropertyMap::new();
                tag.insert(BUTTON_KEY.to_string(), Value::from(index));
                layer.merge_properties(tag);
                items.push(layer);
            }
        }
        items
    }
}

/// Parses a map description with `[lat, lng]` coordinates.
pub fn parse(text: &str) -> Result<MapDocument> {
    parse_with(text, false)
}

/// Parses a map description; `lonlat` reads coordinates as `[lng, lat]`.
///
/// Fails with [`MapError::UnrecognizedFormat`] when no `map` line opens the
/// description.
pub fn parse_with(text: &str, lonlat: bool) -> Result<MapDocument> {
    let mut parser = Parser::new(lonlat);
    for line in text.lines() {
        parser.line(line);
        if parser.finished {
            break;
        }
    }

    if !parser.opened {
        return Err(MapError::UnrecognizedFormat(
            "map description must start with a 'map' line".to_string(),
        ));
    }
    Ok(parser.document)
}

struct Parser {
    state: State,
    in_button: bool,
    opened: bool,
    finished: bool,
    lonlat: bool,
    buffer: Vec<LatLng>,
    label: Option<String>,
    color: Option<String>,
    document: MapDocument,
}

impl Parser {
    fn new(lonlat: bool) -> Self {
        Self {
            state: State::TopLevel,
            in_button: false,
            opened: false,
            finished: false,
            lonlat,
            buffer: Vec::new(),
            label: None,
            color: None,
            document: MapDocument::default(),
        }
    }

    fn line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }

        if line.starts_with('#') {
            self.color = line.split_whitespace().next().map(normalize_color);
            return;
        }

        let rest = match extract_label(line) {
            Some((label, rest)) => {
                self.label = Some(label);
                rest
            }
            None => line.to_string(),
        };

        if rest.contains('[') && rest.contains(',') && rest.contains(']') {
            self.coordinate(&rest);
            return;
        }

        let tokens: Vec<String> = rest
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        let closes = has_token(&tokens, &["plz", "please"]);
        match self.state {
            State::TopLevel => {
                if has_token(&tokens, &["map"]) {
                    self.state = State::Map;
                    self.opened = true;
                }
            }
            State::Map | State::Button => {
                if has_token(&tokens, &["button", "btn"]) {
                    self.document.buttons.push(Button {
                        label: self.label.take(),
                        layers: Vec::new(),
                    });
                    self.in_button = true;
                    self.state = State::Button;
                } else if let Some(next) = geometry_state(&tokens) {
                    self.buffer.clear();
                    self.state = next;
                } else if closes {
                    if self.state == State::Map {
                        self.state = State::TopLevel;
                        self.finished = true;
                    } else {
                        self.state = State::Map;
                        self.in_button = false;
                    }
                }
            }
            State::Marker | State::Line | State::Shape => {
                if closes {
                    self.finalize();
                    self.state = if self.in_button {
                        State::Button
                    } else {
                        State::Map
                    };
                }
            }
        }
    }

    fn coordinate(&mut self, line: &str) {
        let (Some(open), Some(close)) = (line.find('['), line.rfind(']')) else {
            return;
        };
        if close <= open {
            return;
        }

        let numbers: Vec<f64> = line[open + 1..close]
            .split(',')
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .collect();

        match numbers.as_slice() {
            [a, b] if self.lonlat => self.buffer.push(LatLng::new(*b, *a)),
            [a, b] => self.buffer.push(LatLng::new(*a, *b)),
            _ => log::debug!("Skipping coordinate line '{}'", line),
        }
    }

    fn finalize(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        let label = self.label.take();
        let color = self.color.take();

        let mut properties = PropertyMap::new();
        let geometry = match self.state {
            State::Marker => buffer.first().copied().map(Geometry::Point).ok_or_else(|| {
                MapError::MissingCoordinate("marker has no coordinate".to_string())
            }),
            State::Line => {
                if let Some(color) = &color {
                    properties.insert("strokeColor".to_string(), Value::from(color.as_str()));
                }
                let geometry = Geometry::Polyline(buffer);
                geometry.validate().map(|_| geometry)
            }
            State::Shape => {
                if let Some(color) = &color {
                    properties.insert("strokeColor".to_string(), Value::from(color.as_str()));
                    properties.insert("fillColor".to_string(), Value::from(color.as_str()));
                }
                Geometry::polygon(vec![buffer])
            }
            _ => return,
        };
        if let Some(label) = label {
            properties.insert("label".to_string(), Value::from(label));
        }

        let mut item = match geometry.and_then(GeoItem::new) {
            Ok(item) => item,
            Err(e) => {
                log::debug!("Skipping {:?} record: {}", self.state, e);
                return;
            }
        };
        item.merge_properties(properties);

        match self.document.buttons.last_mut() {
            Some(button) if self.in_button => button.layers.push(item),
            _ => self.document.items.push(item),
        }
    }
}

fn has_token(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

fn geometry_state(tokens: &[String]) -> Option<State> {
    tokens.iter().find_map(|token| match token.as_str() {
        "marker" => Some(State::Marker),
        "line" => Some(State::Line),
        "shape" => Some(State::Shape),
        _ => None,
    })
}

/// Splits the first double-quoted substring off a line.
fn extract_label(line: &str) -> Option<(String, String)> {
    let open = line.find('"')?;
    let close = open + 1 + line[open + 1..].find('"')?;
    let label = line[open + 1..close].to_string();
    let rest = format!("{} {}", &line[..open], &line[close + 1..]);
    Some((label, rest))
}

/// Three- and six-digit hex colors keep their `#`; anything else (named
/// colors written as `#red`) loses it.
fn normalize_color(token: &str) -> String {
    if token.len() == 4 || token.len() == 7 {
        token.to_string()
    } else {
        token.trim_start_matches('#').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapplz_types::geo::GeometryKind;
    use serde_json::json;

    const LIBERTY: &str = r#"
map
  marker
    "The Statue of Liberty"
    [40, -70]
  plz
plz
"#;

    #[test]
    fn test_single_marker() {
        let doc = parse(LIBERTY).unwrap();
        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.coordinate(), Some(LatLng::new(40.0, -70.0)));
        assert_eq!(item.get("label"), Some(&json!("The Statue of Liberty")));
    }

    #[test]
    fn test_keywords_ignore_case() {
        let doc = parse("MAP\n Marker\n [1, 2]\n PLEASE\nPlz").unwrap();
        assert_eq!(doc.items.len(), 1);
    }

    #[test]
    fn test_line_and_shape() {
        let text = "map\nline\n#f00\n[0, 0]\n[1, 1]\nplz\nshape\n#00ff00\n[0, 0]\n[0, 2]\n[2, 2]\nplz\nplz";
        let doc = parse(text).unwrap();
        assert_eq!(doc.items.len(), 2);

        let line = &doc.items[0];
        assert_eq!(line.kind(), GeometryKind::Polyline);
        assert_eq!(line.get("strokeColor"), Some(&json!("#f00")));

        let shape = &doc.items[1];
        assert_eq!(shape.kind(), GeometryKind::Polygon);
        assert_eq!(shape.rings().unwrap()[0].len(), 4);
        assert_eq!(shape.get("fillColor"), Some(&json!("#00ff00")));
    }

    #[test]
    fn test_two_point_shape_is_skipped() {
        let text = "map\nshape\n[0, 0]\n[1, 1]\nplz\nmarker\n[5, 5]\nplz\nplz";
        let doc = parse(text).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].kind(), GeometryKind::Point);
    }

    #[test]
    fn test_named_color_loses_hash() {
        let doc = parse("map\nline\n#red\n[0, 0]\n[1, 1]\nplz\nplz").unwrap();
        assert_eq!(doc.items[0].get("strokeColor"), Some(&json!("red")));

        // Four characters including the hash: kept as written.
        let doc = parse("map\nline\n#tan\n[0, 0]\n[1, 1]\nplz\nplz").unwrap();
        assert_eq!(doc.items[0].get("strokeColor"), Some(&json!("#tan")));
    }

    #[test]
    fn test_label_does_not_trigger_keywords() {
        let doc = parse("map\nmarker\n\"line up please\"\n[1, 2]\nplz\nplz").unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].get("label"), Some(&json!("line up please")));
    }

    #[test]
    fn test_wrong_arity_is_skipped() {
        let doc = parse("map\nline\n[0, 0, 5]\n[1, 1]\n[2, 2]\nplz\nplz").unwrap();
        assert_eq!(doc.items[0].path().unwrap().len(), 2);
    }

    #[test]
    fn test_lines_after_close_are_ignored() {
        let doc = parse("map\nplz\nmap\nmarker\n[1, 2]\nplz\nplz").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_unterminated_is_not_an_error() {
        let doc = parse("map\nmarker\n[1, 2]").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_empty_marker_is_skipped() {
        let doc = parse("map\nmarker\n\"nowhere\"\nplz\nmarker\n[1, 2]\nplz\nplz").unwrap();
        assert_eq!(doc.items.len(), 1);
        // The label was consumed by the skipped marker.
        assert!(doc.items[0].get("label").is_none());
    }

    #[test]
    fn test_buttons() {
        let text = r#"
map
  marker
    [0, 0]
  plz
  button "Parks"
    marker
      "Central Park"
      [40.78, -73.96]
    plz
  plz
  btn
    line
      [1, 1]
      [2, 2]
    plz
  plz
plz
"#;
        let doc = parse(text).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.buttons.len(), 2);
        assert_eq!(doc.buttons[0].label.as_deref(), Some("Parks"));
        assert_eq!(doc.buttons[1].layers[0].kind(), GeometryKind::Polyline);
        assert_eq!(doc.len(), 3);

        let items = doc.into_items();
        assert!(items[0].get(BUTTON_KEY).is_none());
        assert_eq!(items[1].get(BUTTON_KEY), Some(&json!(0)));
        assert_eq!(items[1].get("label"), Some(&json!("Central Park")));
        assert_eq!(items[2].get(BUTTON_KEY), Some(&json!(1)));
    }

    #[test]
    fn test_lonlat_order() {
        let doc = parse_with("map\nmarker\n[-70, 40]\nplz\nplz", true).unwrap();
        assert_eq!(doc.items[0].coordinate(), Some(LatLng::new(40.0, -70.0)));
    }

    #[test]
    fn test_requires_map() {
        assert!(matches!(
            parse("marker\n[1, 2]\nplz"),
            Err(MapError::UnrecognizedFormat(_))
        ));
    }
}
