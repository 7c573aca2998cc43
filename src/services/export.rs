//! Route export layout
//!
//! Turns a sequenced route into layout blocks and places them on
//! letter-size pages (612 x 792 pt). Placement is a fixed cursor walk so
//! the same input always produces the same pages.

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::services::metrics::RouteMetrics;
use crate::types::{DirectionsResult, SequencedRoute};

pub const PAGE_WIDTH_PT: u32 = 612;
pub const PAGE_HEIGHT_PT: u32 = 792;

/// Cursor position past which the next line goes on a new page
const PAGE_BREAK_Y: u32 = 700;
const TOP_MARGIN_Y: u32 = 50;
const FIRST_PAGE_START_Y: u32 = 330;
const LINE_STEP: u32 = 20;
const SECTION_X: u32 = 50;
const ITEM_X: u32 = 60;
const HEADING_FONT_SIZE: u32 = 14;
const BODY_FONT_SIZE: u32 = 12;

/// Where the captured map goes on the first page
pub const MAP_IMAGE: ImagePlacement = ImagePlacement {
    x: 50,
    y: 50,
    width: 500,
    height: 250,
};

/// One logical element of the export, before pagination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum LayoutBlock {
    Heading(String),
    Text(String),
    /// Numbered entry, rendered as `"{number}. {text}"`
    Item { number: usize, text: String },
    /// Vertical space in points
    Gap(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedText {
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePlacement>,
    pub lines: Vec<PlacedText>,
}

/// Remove every `<...>` tag from provider instruction text.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        // A tag needs at least one character before its closing '>'
        match after.find('>') {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..=start]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build the export blocks for a route.
pub fn format(
    route: &SequencedRoute,
    metrics: &RouteMetrics,
    directions: &DirectionsResult,
) -> Result<Vec<LayoutBlock>, RouteError> {
    if route.stops.is_empty() {
        return Err(RouteError::ExportFailed("route has no stops".to_string()));
    }

    let mut blocks = vec![
        LayoutBlock::Heading(format!("Route: {}", route.name)),
        LayoutBlock::Gap(10),
        LayoutBlock::Text(format!("Number of Stops: {}", route.stop_count())),
        LayoutBlock::Gap(10),
        LayoutBlock::Text("Addresses:".to_string()),
    ];

    blocks.extend(route.stops.iter().enumerate().map(|(i, address)| LayoutBlock::Item {
        number: i + 1,
        text: address.clone(),
    }));

    blocks.push(LayoutBlock::Gap(LINE_STEP));
    blocks.push(LayoutBlock::Text(format!("Total Duration: {}", metrics.duration_display())));
    blocks.push(LayoutBlock::Text(format!("Total Distance: {}", metrics.distance_display())));

    if !directions.legs.is_empty() {
        blocks.push(LayoutBlock::Gap(LINE_STEP));
        blocks.push(LayoutBlock::Text("Directions:".to_string()));

        for (leg_index, leg) in directions.legs.iter().enumerate() {
            blocks.push(LayoutBlock::Text(format!("Leg {}:", leg_index + 1)));
            blocks.extend(leg.steps.iter().enumerate().map(|(step_index, step)| LayoutBlock::Item {
                number: step_index + 1,
                text: strip_markup(step),
            }));
            blocks.push(LayoutBlock::Gap(10));
        }
    }

    Ok(blocks)
}

/// Place blocks on pages. The first page reserves its top for the map.
pub fn paginate(blocks: &[LayoutBlock]) -> Vec<Page> {
    let mut pages = vec![Page {
        number: 1,
        image: Some(MAP_IMAGE),
        lines: Vec::new(),
    }];
    let mut y = FIRST_PAGE_START_Y;

    for block in blocks {
        let (x, font_size, text) = match block {
            LayoutBlock::Gap(points) => {
                y += points;
                continue;
            }
            LayoutBlock::Heading(text) => (SECTION_X, HEADING_FONT_SIZE, text.clone()),
            LayoutBlock::Text(text) => (SECTION_X, BODY_FONT_SIZE, text.clone()),
            LayoutBlock::Item { number, text } => (ITEM_X, BODY_FONT_SIZE, format!("{}. {}", number, text)),
        };

        if y > PAGE_BREAK_Y {
            let number = pages.len() + 1;
            pages.push(Page {
                number,
                image: None,
                lines: Vec::new(),
            });
            y = TOP_MARGIN_Y;
        }

        if let Some(page) = pages.last_mut() {
            page.lines.push(PlacedText { x, y, font_size, text });
        }
        y += LINE_STEP;
    }

    pages
}

/// Download name for an exported route
pub fn export_file_name(route_name: &str) -> String {
    let safe: String = route_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("Route_{}.json", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics::aggregate;
    use crate::types::Leg;

    fn route(stops: &[&str]) -> SequencedRoute {
        SequencedRoute {
            name: "Morning Loop".to_string(),
            stops: stops.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn directions(steps_per_leg: &[usize]) -> DirectionsResult {
        DirectionsResult {
            legs: steps_per_leg
                .iter()
                .map(|&n| Leg {
                    distance_meters: 1000,
                    duration_seconds: 300,
                    steps: (0..n).map(|i| format!("Turn <b>left</b> at <div>street {}</div>", i)).collect(),
                })
                .collect(),
            waypoint_order: vec![],
            bounds: None,
            geometry: vec![],
        }
    }

    fn texts(pages: &[Page]) -> Vec<String> {
        pages.iter().flat_map(|p| p.lines.iter().map(|l| l.text.clone())).collect()
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("Turn <b>left</b> onto <span class=\"x\">Main St</span>"), "Turn left onto Main St");
        assert_eq!(strip_markup("no tags"), "no tags");
        assert_eq!(strip_markup("a < b and c > d"), "a  d");
        assert_eq!(strip_markup("1 <> 2"), "1 <> 2");
        assert_eq!(strip_markup("dangling <b"), "dangling <b");
    }

    #[test]
    fn test_block_order() {
        let r = route(&["A", "C", "B"]);
        let d = directions(&[1, 2]);
        let m = aggregate(&d, 3, 1800).unwrap();
        let blocks = format(&r, &m, &d).unwrap();

        let rendered: Vec<String> = blocks
            .iter()
            .filter_map(|b| match b {
                LayoutBlock::Heading(t) | LayoutBlock::Text(t) => Some(t.clone()),
                LayoutBlock::Item { number, text } => Some(format!("{}. {}", number, text)),
                LayoutBlock::Gap(_) => None,
            })
            .collect();

        assert_eq!(
            rendered,
            vec![
                "Route: Morning Loop",
                "Number of Stops: 3",
                "Addresses:",
                "1. A",
                "2. C",
                "3. B",
                "Total Duration: 1h 40m",
                "Total Distance: 1.2 mi",
                "Directions:",
                "Leg 1:",
                "1. Turn left at street 0",
                "Leg 2:",
                "1. Turn left at street 0",
                "2. Turn left at street 1",
            ]
        );
    }

    #[test]
    fn test_empty_route_fails_export() {
        let d = directions(&[]);
        let m = aggregate(&d, 0, 1800).unwrap();
        let err = format(&route(&[]), &m, &d).unwrap_err();
        assert!(matches!(err, RouteError::ExportFailed(_)));
    }

    #[test]
    fn test_directions_section_omitted_without_legs() {
        let r = route(&["A"]);
        let d = directions(&[]);
        let m = aggregate(&d, 1, 1800).unwrap();
        let blocks = format(&r, &m, &d).unwrap();
        assert!(!blocks.contains(&LayoutBlock::Text("Directions:".to_string())));
    }

    #[test]
    fn test_first_page_positions() {
        let r = route(&["A", "B"]);
        let d = directions(&[1]);
        let m = aggregate(&d, 2, 1800).unwrap();
        let pages = paginate(&format(&r, &m, &d).unwrap());

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].image, Some(MAP_IMAGE));
        let lines = &pages[0].lines;
        assert_eq!((lines[0].x, lines[0].y, lines[0].font_size), (50, 330, 14));
        assert_eq!(lines[1].text, "Number of Stops: 2");
        assert_eq!((lines[1].x, lines[1].y), (50, 360));
        assert_eq!((lines[2].x, lines[2].y), (50, 390));
        assert_eq!((lines[3].x, lines[3].y, lines[3].text.as_str()), (60, 410, "1. A"));
        assert_eq!((lines[4].x, lines[4].y), (60, 430));
        // 20pt gap after the address list
        assert_eq!(lines[5].y, 470);
        assert_eq!(lines[5].text, "Total Duration: 1h 5m");
    }

    #[test]
    fn test_long_directions_break_pages() {
        let r = route(&["A", "B"]);
        let d = directions(&[40]);
        let m = aggregate(&d, 2, 1800).unwrap();
        let pages = paginate(&format(&r, &m, &d).unwrap());

        assert!(pages.len() >= 2);
        for page in &pages {
            for line in &page.lines {
                assert!(line.y <= PAGE_BREAK_Y, "line at {} overflows", line.y);
            }
        }
        let second = &pages[1];
        assert_eq!(second.number, 2);
        assert!(second.image.is_none());
        assert_eq!(second.lines[0].y, TOP_MARGIN_Y);
    }

    #[test]
    fn test_break_happens_only_past_threshold() {
        // Line k would sit at 330 + 20k; 690 is the last one at or below 700.
        let blocks: Vec<LayoutBlock> = (0..21).map(|i| LayoutBlock::Text(format!("line {}", i))).collect();
        let pages = paginate(&blocks);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].lines.len(), 19);
        assert_eq!(pages[0].lines.last().map(|l| l.y), Some(690));
        assert_eq!(pages[1].lines[0].y, 50);
        assert_eq!(pages[1].lines[0].text, "line 19");
        assert_eq!(pages[1].lines[1].y, 70);
    }

    #[test]
    fn test_pagination_is_deterministic() {
        let r = route(&["A", "B", "C"]);
        let d = directions(&[12, 30, 5]);
        let m = aggregate(&d, 3, 1800).unwrap();
        let blocks = format(&r, &m, &d).unwrap();
        assert_eq!(paginate(&blocks), paginate(&blocks));
        assert_eq!(texts(&paginate(&blocks)).len(), blocks.iter().filter(|b| !matches!(b, LayoutBlock::Gap(_))).count());
    }

    #[test]
    fn test_export_file_name_is_filesystem_safe() {
        assert_eq!(export_file_name("Morning Loop"), "Route_Morning_Loop.json");
        assert_eq!(export_file_name("a/b\\c"), "Route_a_b_c.json");
    }
}
