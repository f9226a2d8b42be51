use crate::{
    common::defs::Continous,
    error::{MdpError, Result},
    mdps::mdp::Mdp,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// (row, column), row 0 at the top.
pub type Cell = (usize, usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridAction {
    North,
    West,
    South,
    East,
}

impl GridAction {
    pub const ALL: [GridAction; 4] = [
        GridAction::North,
        GridAction::West,
        GridAction::South,
        GridAction::East,
    ];

    fn delta(self) -> (isize, isize) {
        match self {
            GridAction::North => (-1, 0),
            GridAction::West => (0, -1),
            GridAction::South => (1, 0),
            GridAction::East => (0, 1),
        }
    }

    fn perpendicular(self) -> [GridAction; 2] {
        match self {
            GridAction::North | GridAction::South => [GridAction::West, GridAction::East],
            GridAction::West | GridAction::East => [GridAction::North, GridAction::South],
        }
    }

    pub fn arrow(self) -> char {
        match self {
            GridAction::North => '^',
            GridAction::West => '<',
            GridAction::South => 'v',
            GridAction::East => '>',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridCell {
    Open,
    Start,
    Wall,
    /// Terminal cell paying the given reward.
    Exit(Continous),
}

impl GridCell {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "." => Ok(GridCell::Open),
            "S" => Ok(GridCell::Start),
            "#" => Ok(GridCell::Wall),
            t => t
                .parse::<Continous>()
                .map(GridCell::Exit)
                .map_err(|_| MdpError::InvalidModel(format!("unrecognized grid cell '{t}'"))),
        }
    }
}

/// Grid world with noisy moves. With probability `1 - noise` the agent moves
/// where it intends, otherwise it slips to one of the two perpendicular
/// directions. Bumping into a wall or the border leaves it in place.
#[derive(Clone, Debug)]
pub struct GridWorld {
    cells: Vec<Vec<GridCell>>,
    living_reward: Continous,
    noise: Continous,
}

impl GridWorld {
    pub const DEFAULT_NOISE: Continous = 0.2;

    /// Each row is whitespace separated tokens: `.` open, `S` start, `#` wall,
    /// or a number for an exit cell with that reward.
    pub fn parse(rows: &[&str]) -> Result<Self> {
        let cells = rows
            .iter()
            .map(|row| row.split_whitespace().map(GridCell::parse).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        let n_cols = cells.first().map_or(0, Vec::len);
        if n_cols == 0 {
            return Err(MdpError::InvalidModel("empty grid".to_string()));
        }
        if let Some(row) = cells.iter().find(|row| row.len() != n_cols) {
            return Err(MdpError::DimensionMismatch {
                expected: n_cols,
                actual: row.len(),
            });
        }

        Ok(Self {
            cells,
            living_reward: 0.,
            noise: Self::DEFAULT_NOISE,
        })
    }

    pub fn book_grid() -> Result<Self> {
        Self::parse(&[
            ". . . +1",
            ". # . -1",
            "S . . .",
        ])
    }

    pub fn bridge_grid() -> Result<Self> {
        Self::parse(&[
            "# -100 -100 -100 -100 -100 #",
            "1 S . . . . 10",
            "# -100 -100 -100 -100 -100 #",
        ])
    }

    pub fn cliff_grid() -> Result<Self> {
        Self::parse(&[
            ". . . . .",
            "S . . . 10",
            "-100 -100 -100 -100 -100",
        ])
    }

    pub fn with_noise(mut self, noise: Continous) -> Result<Self> {
        if !(0.0..=1.0).contains(&noise) {
            return Err(MdpError::InvalidModel(format!("noise {noise} is not a probability")));
        }
        self.noise = noise;
        Ok(self)
    }

    pub fn with_living_reward(mut self, living_reward: Continous) -> Self {
        self.living_reward = living_reward;
        self
    }

    pub fn n_rows(&self) -> usize {
        self.cells.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cells[0].len()
    }

    pub fn cell(&self, (r, c): Cell) -> Option<GridCell> {
        self.cells.get(r).and_then(|row| row.get(c)).copied()
    }

    pub fn start(&self) -> Option<Cell> {
        self.cells_with_pos()
            .find(|(_, cell)| *cell == GridCell::Start)
            .map(|(pos, _)| pos)
    }

    /// One line per row: arrows for actions, `#` for walls, `X` for exits.
    pub fn render_policy(&self, policy: impl Fn(&Cell) -> Option<GridAction>) -> String {
        self.render(|pos, cell| match cell {
            GridCell::Wall => "#".to_string(),
            GridCell::Exit(_) => "X".to_string(),
            _ => policy(&pos).map_or('?', GridAction::arrow).to_string(),
        })
    }

    pub fn render_values(&self, value: impl Fn(&Cell) -> Option<Continous>) -> String {
        self.render(|pos, cell| match (cell, value(&pos)) {
            (GridCell::Wall, _) => format!("{:>7}", "#"),
            (_, Some(v)) => format!("{v:>7.2}"),
            (_, None) => format!("{:>7}", "?"),
        })
    }

    fn render(&self, fmt_cell: impl Fn(Cell, GridCell) -> String) -> String {
        self.cells
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, &cell)| fmt_cell((r, c), cell))
                    .join(" ")
            })
            .join("\n")
    }

    fn cells_with_pos(&self) -> impl Iterator<Item = (Cell, GridCell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, &cell)| ((r, c), cell)))
    }

    fn is_open(&self, pos: Cell) -> bool {
        matches!(self.cell(pos), Some(cell) if cell != GridCell::Wall)
    }

    fn destination(&self, (r, c): Cell, a: GridAction) -> Cell {
        let (dr, dc) = a.delta();
        match (r.checked_add_signed(dr), c.checked_add_signed(dc)) {
            (Some(nr), Some(nc)) if self.is_open((nr, nc)) => (nr, nc),
            _ => (r, c),
        }
    }
}

impl Mdp for GridWorld {
    type State = Cell;
    type Action = GridAction;

    fn states(&self) -> Vec<Cell> {
        self.cells_with_pos()
            .filter(|(_, cell)| *cell != GridCell::Wall)
            .map(|(pos, _)| pos)
            .collect()
    }

    fn possible_actions(&self, s: &Cell) -> Vec<GridAction> {
        match self.cell(*s) {
            Some(GridCell::Open | GridCell::Start) => GridAction::ALL.to_vec(),
            _ => vec![],
        }
    }

    fn transition_states_and_probs(&self, s: &Cell, a: &GridAction) -> Vec<(Cell, Continous)> {
        if !matches!(self.cell(*s), Some(GridCell::Open | GridCell::Start)) {
            return vec![];
        }

        let [left, right] = a.perpendicular();
        let moves = [
            (*a, 1. - self.noise),
            (left, self.noise / 2.),
            (right, self.noise / 2.),
        ];

        let mut ts: Vec<(Cell, Continous)> = Vec::with_capacity(moves.len());
        for (dir, p) in moves {
            if p <= 0. {
                continue;
            }
            let next = self.destination(*s, dir);
            match ts.iter_mut().find(|(pos, _)| *pos == next) {
                Some((_, acc)) => *acc += p,
                None => ts.push((next, p)),
            }
        }

        ts
    }

    fn reward(&self, s: &Cell) -> Continous {
        match self.cell(*s) {
            Some(GridCell::Exit(r)) => r,
            Some(GridCell::Open | GridCell::Start) => self.living_reward,
            _ => 0.,
        }
    }

    fn is_terminal(&self, s: &Cell) -> bool {
        matches!(self.cell(*s), Some(GridCell::Exit(_)))
    }
}
