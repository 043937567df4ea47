//! Test pad placement around the fixture board.
//!
//! Each outer pad is assigned to the board edge it faces: the dominant axis
//! of its position picks left/right or top/bottom, the sign picks the side.
//! Pads on one edge are sorted along the edge and laid out on a fixed pitch,
//! centred on the edge. The board grows with the busiest edge.

use serde::Serialize;

use crate::interconnect::generator::records::Point;

/// Board edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Negative X.
    Left,
    /// Positive X.
    Right,
    /// Positive Y.
    Top,
    /// Negative Y.
    Bottom,
}

impl Edge {
    /// All edges, in layout order.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    /// The edge a pad at `(x, y)` faces. Diagonals go to top/bottom.
    #[must_use]
    pub fn facing(x: f64, y: f64) -> Self {
        if x.abs() > y.abs() {
            if x < 0.0 {
                Self::Left
            } else {
                Self::Right
            }
        } else if y < 0.0 {
            Self::Bottom
        } else {
            Self::Top
        }
    }

    const fn is_vertical(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Unit vector pointing from the board centre towards this edge.
    #[must_use]
    pub const fn outward(self) -> (f64, f64) {
        match self {
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
            Self::Top => (0.0, 1.0),
            Self::Bottom => (0.0, -1.0),
        }
    }
}

/// Spacing rules for test pads and the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRules {
    /// Centre-to-centre test pad spacing along an edge (mm).
    pub pitch: f64,
    /// Smallest allowed board side (mm).
    pub board_min_size: f64,
    /// Extra board length beyond the outermost test pads of an edge (mm).
    pub board_margin: f64,
    /// Distance from the board edge to test pad centres (mm).
    pub inset: f64,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            pitch: 2.54,
            board_min_size: 20.0,
            board_margin: 3.0,
            inset: 1.5,
        }
    }
}

/// Where one outer pad's test pad goes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slot {
    /// Edge the test pad sits on.
    pub edge: Edge,
    /// Test pad centre.
    pub position: Point,
}

/// Planned test pad positions and board size.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureLayout {
    /// Square board side (mm).
    pub board_size: f64,
    /// One slot per input position, in input order.
    pub slots: Vec<Slot>,
}

impl FixtureLayout {
    /// Plans test pads for pads at `positions`.
    #[must_use]
    pub fn plan(positions: &[Point], rules: &LayoutRules) -> Self {
        let edges: Vec<Edge> = positions.iter().map(|p| Edge::facing(p.x, p.y)).collect();

        let busiest = Edge::ALL
            .iter()
            .map(|&edge| edges.iter().filter(|&&e| e == edge).count())
            .max()
            .unwrap_or(0);
        #[allow(clippy::cast_precision_loss)] // pin counts are tiny
        let driven = busiest as f64 * rules.pitch + 2.0 * rules.board_margin;
        let board_size = rules.board_min_size.max(driven);
        let rim = board_size / 2.0 - rules.inset;

        let mut slots = vec![
            Slot {
                edge: Edge::Top,
                position: Point::default(),
            };
            positions.len()
        ];

        for edge in Edge::ALL {
            let mut members: Vec<usize> = (0..positions.len())
                .filter(|&i| edges[i] == edge)
                .collect();
            // Left/right run top to bottom, top/bottom run left to right, so
            // pad order on the chip matches test pad order on the edge.
            if edge.is_vertical() {
                members.sort_by(|&a, &b| positions[b].y.total_cmp(&positions[a].y));
            } else {
                members.sort_by(|&a, &b| positions[a].x.total_cmp(&positions[b].x));
            }

            #[allow(clippy::cast_precision_loss)]
            let half_span = (members.len().saturating_sub(1)) as f64 / 2.0;
            let (ox, oy) = edge.outward();
            for (rank, &index) in members.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let offset = (rank as f64 - half_span) * rules.pitch;
                let position = if edge.is_vertical() {
                    Point::new(ox * rim, -offset)
                } else {
                    Point::new(offset, oy * rim)
                };
                slots[index] = Slot { edge, position };
            }
        }

        Self { board_size, slots }
    }
}
