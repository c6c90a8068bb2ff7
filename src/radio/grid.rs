//! Field discretization for broadcast positions
//!
//! A grid covers `[-half_length, half_length] × [-half_width, half_width]` with
//! `cells_per_meter` resolution per axis, lines along x and columns along y:
//!
//! ```text
//! lines = 2·half_length·cells_per_meter_x + 1
//! cols  = 2·half_width·cells_per_meter_y + 1
//! cell  = line·cols + col
//! ```
//!
//! Player fields extend the cell range with a fallen copy and two sentinels:
//!
//! ```text
//! 0 .. cells          standing at cell
//! cells .. 2·cells    fallen at cell
//! 2·cells             out of bounds (more than 1 m outside the grid)
//! 2·cells + 1         unknown
//! ```

use crate::config::GridConfig;
use crate::error::{Error, Result};

/// Margin beyond the grid that is still clamped onto its border (m)
const BORDER_MARGIN: f32 = 1.0;

/// Height reported for a decoded ball (resting on the ground)
pub const BALL_RADIUS: f32 = 0.042;

/// Rectangular position grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGrid {
    half_length: f32,
    half_width: f32,
    res_x: f32,
    res_y: f32,
    lines: u32,
    cols: u32,
}

impl FieldGrid {
    pub fn new(cfg: &GridConfig) -> Result<Self> {
        let (lines, cols) = cfg.dimensions().ok_or_else(|| {
            Error::InvalidConfig(format!("grid cannot be represented: {:?}", cfg))
        })?;
        Ok(Self {
            half_length: cfg.half_length,
            half_width: cfg.half_width,
            res_x: cfg.cells_per_meter_x,
            res_y: cfg.cells_per_meter_y,
            lines,
            cols,
        })
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cells(&self) -> u32 {
        self.lines * self.cols
    }

    /// Whether the point lies more than the border margin outside the grid
    pub fn is_far_outside(&self, pos: [f32; 2]) -> bool {
        pos[0].abs() > self.half_length + BORDER_MARGIN
            || pos[1].abs() > self.half_width + BORDER_MARGIN
    }

    /// Nearest cell, clamped onto the grid
    pub fn cell_of(&self, pos: [f32; 2]) -> u32 {
        let snap = |v: f32, res: f32, half: f32, count: u32| -> u32 {
            let idx = (res * v + res * half).round_ties_even();
            idx.clamp(0.0, (count - 1) as f32) as u32
        };
        let line = snap(pos[0], self.res_x, self.half_length, self.lines);
        let col = snap(pos[1], self.res_y, self.half_width, self.cols);
        line * self.cols + col
    }

    /// Centre of a cell; `cell` must be below [`Self::cells`]
    pub fn position_of(&self, cell: u32) -> [f32; 2] {
        let line = cell / self.cols;
        let col = cell % self.cols;
        [
            line as f32 / self.res_x - self.half_length,
            col as f32 / self.res_y - self.half_width,
        ]
    }
}

/// What a player field says about one player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerReport {
    Unknown,
    OutOfBounds,
    At { pos: [f32; 2], fallen: bool },
}

/// Grid for teammate or opponent positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerGrid {
    grid: FieldGrid,
}

impl PlayerGrid {
    pub fn new(cfg: &GridConfig) -> Result<Self> {
        Ok(Self {
            grid: FieldGrid::new(cfg)?,
        })
    }

    pub fn grid(&self) -> &FieldGrid {
        &self.grid
    }

    /// Number of distinct values of one player field
    pub fn cardinality(&self) -> u32 {
        2 * self.grid.cells() + 2
    }

    pub fn encode(&self, report: PlayerReport) -> u32 {
        let cells = self.grid.cells();
        match report {
            PlayerReport::Unknown => 2 * cells + 1,
            PlayerReport::OutOfBounds => 2 * cells,
            PlayerReport::At { pos, .. } if self.grid.is_far_outside(pos) => 2 * cells,
            PlayerReport::At { pos, fallen } => {
                self.grid.cell_of(pos) + if fallen { cells } else { 0 }
            }
        }
    }

    /// Inverse of [`Self::encode`] up to grid resolution; `None` above the cardinality
    pub fn decode(&self, combination: u32) -> Option<PlayerReport> {
        let cells = self.grid.cells();
        match combination {
            c if c < cells => Some(PlayerReport::At {
                pos: self.grid.position_of(c),
                fallen: false,
            }),
            c if c < 2 * cells => Some(PlayerReport::At {
                pos: self.grid.position_of(c - cells),
                fallen: true,
            }),
            c if c == 2 * cells => Some(PlayerReport::OutOfBounds),
            c if c == 2 * cells + 1 => Some(PlayerReport::Unknown),
            _ => None,
        }
    }
}

/// Grid for the ball; always a position, clamped onto the field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallGrid {
    grid: FieldGrid,
}

impl BallGrid {
    pub fn new(cfg: &GridConfig) -> Result<Self> {
        Ok(Self {
            grid: FieldGrid::new(cfg)?,
        })
    }

    pub fn cardinality(&self) -> u32 {
        self.grid.cells()
    }

    pub fn encode(&self, pos: [f32; 2]) -> u32 {
        self.grid.cell_of(pos)
    }

    pub fn decode(&self, combination: u32) -> Option<[f32; 3]> {
        (combination < self.grid.cells()).then(|| {
            let [x, y] = self.grid.position_of(combination);
            [x, y, BALL_RADIUS]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_grid_dimensions() {
        let mate = PlayerGrid::new(&GridConfig::teammate_defaults()).unwrap();
        assert_eq!((mate.grid().lines(), mate.grid().cols()), (321, 221));
        assert_eq!(mate.grid().cells(), 70_941);
        assert_eq!(mate.cardinality(), 141_884);

        let opp = PlayerGrid::new(&GridConfig::opponent_defaults()).unwrap();
        assert_eq!((opp.grid().lines(), opp.grid().cols()), (201, 111));
        assert_eq!(opp.cardinality(), 44_624);

        let ball = BallGrid::new(&GridConfig::ball_defaults()).unwrap();
        assert_eq!(ball.cardinality(), 60_501);
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let fine = GridConfig {
            cells_per_meter_x: 2000.0,
            cells_per_meter_y: 2000.0,
            ..GridConfig::teammate_defaults()
        };
        assert!(matches!(PlayerGrid::new(&fine), Err(Error::InvalidConfig(_))));
        assert!(matches!(BallGrid::new(&fine), Err(Error::InvalidConfig(_))));

        // the finest accepted grid still has a representable cardinality
        let finest = GridConfig {
            half_length: 1.0,
            half_width: 1.0,
            cells_per_meter_x: 10_000.0,
            cells_per_meter_y: 10_000.0,
        };
        let grid = PlayerGrid::new(&finest).unwrap();
        assert_eq!(grid.grid().cells(), 20_001 * 20_001);
        assert_eq!(grid.cardinality(), 2 * 20_001 * 20_001 + 2);
    }

    #[test]
    fn test_player_position_within_resolution() {
        let mate = PlayerGrid::new(&GridConfig::teammate_defaults()).unwrap();
        let c = mate.encode(PlayerReport::At {
            pos: [3.14, -7.77],
            fallen: true,
        });
        let Some(PlayerReport::At { pos, fallen }) = mate.decode(c) else {
            panic!("expected a position");
        };
        assert!(fallen);
        assert_relative_eq!(pos[0], 3.1, epsilon = 1e-4);
        assert_relative_eq!(pos[1], -7.8, epsilon = 1e-4);
    }

    #[test]
    fn test_border_clamping_and_out_of_bounds() {
        let opp = PlayerGrid::new(&GridConfig::opponent_defaults()).unwrap();
        let cells = opp.grid().cells();

        // within the 1 m margin: clamped onto the last line
        let c = opp.encode(PlayerReport::At {
            pos: [16.8, 0.0],
            fallen: false,
        });
        let Some(PlayerReport::At { pos, .. }) = opp.decode(c) else {
            panic!("expected a position");
        };
        assert_relative_eq!(pos[0], 16.0, epsilon = 1e-4);

        let far = PlayerReport::At {
            pos: [0.0, -12.5],
            fallen: false,
        };
        assert_eq!(opp.encode(far), 2 * cells);
        assert_eq!(opp.decode(2 * cells), Some(PlayerReport::OutOfBounds));
        assert_eq!(opp.encode(PlayerReport::Unknown), 2 * cells + 1);
        assert_eq!(opp.decode(2 * cells + 1), Some(PlayerReport::Unknown));
        assert_eq!(opp.decode(2 * cells + 2), None);
    }

    #[test]
    fn test_ball_resting_height() {
        let ball = BallGrid::new(&GridConfig::ball_defaults()).unwrap();
        let pos = ball.decode(ball.encode([-14.96, 9.99])).unwrap();
        assert_relative_eq!(pos[0], -15.0, epsilon = 1e-4);
        assert_relative_eq!(pos[1], 10.0, epsilon = 1e-4);
        assert_relative_eq!(pos[2], BALL_RADIUS);
        assert!(ball.decode(ball.cardinality()).is_none());
    }
}
