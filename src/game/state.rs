use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::rules::MoveError;

/// 棋盘边长。
pub const SIZE: usize = 3;
/// 棋盘格子总数。
pub const CELL_COUNT: usize = SIZE * SIZE;

/// 全部 8 条连线：三行、三列、两条对角线，顺序固定。
pub const WINNING_LINES: [Line; 8] = [
    Line::new([0, 1, 2]),
    Line::new([3, 4, 5]),
    Line::new([6, 7, 8]),
    Line::new([0, 3, 6]),
    Line::new([1, 4, 7]),
    Line::new([2, 5, 8]),
    Line::new([0, 4, 8]),
    Line::new([2, 4, 6]),
];

/// 对局双方的棋子。X 永远先手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    X,
    O,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::X => Side::O,
            Side::O => Side::X,
        }
    }

    pub fn to_cell(self) -> Cell {
        match self {
            Side::X => Cell::X,
            Side::O => Cell::O,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::X => write!(f, "X"),
            Side::O => write!(f, "O"),
        }
    }
}

impl FromStr for Side {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Side::X),
            "O" | "o" | "0" => Ok(Side::O),
            other => Err(MoveError::InvalidSide {
                value: other.to_string(),
            }),
        }
    }
}

/// 单个格子。在 JS 一侧表示为 `null | "X" | "O"`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "Option<Side>", into = "Option<Side>")]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn side(self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Side::X),
            Cell::O => Some(Side::O),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Option<Side>> for Cell {
    fn from(value: Option<Side>) -> Self {
        value.map_or(Cell::Empty, Side::to_cell)
    }
}

impl From<Cell> for Option<Side> {
    fn from(cell: Cell) -> Self {
        cell.side()
    }
}

/// 3×3 棋盘快照，按行优先存储。实现 `Copy`，搜索时按值复制，调用方的棋盘不会被修改。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "Vec<Cell>", into = "Vec<Cell>")]
pub struct Grid {
    cells: [Cell; CELL_COUNT],
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Cell; CELL_COUNT]) -> Self {
        Self { cells }
    }

    /// 从 `"XX_OO____"` 这样的字符串解析棋盘，`_` 或 `.` 表示空格子，空白字符被忽略。
    pub fn parse(layout: &str) -> Result<Self, MoveError> {
        let chars: Vec<char> = layout.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.len() != CELL_COUNT {
            return Err(MoveError::InvalidGrid { len: chars.len() });
        }
        let mut cells = [Cell::Empty; CELL_COUNT];
        for (cell, ch) in cells.iter_mut().zip(chars) {
            *cell = match ch {
                '_' | '.' => Cell::Empty,
                other => Side::from_str(&other.to_string())?.to_cell(),
            };
        }
        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| !cell.is_empty())
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// 不做校验地落子，只供已经确认格子为空的调用方使用。
    pub(crate) fn place(&mut self, index: usize, side: Side) {
        self.cells[index] = side.to_cell();
    }
}

impl TryFrom<Vec<Cell>> for Grid {
    type Error = MoveError;

    fn try_from(cells: Vec<Cell>) -> Result<Self, Self::Error> {
        let len = cells.len();
        let cells: [Cell; CELL_COUNT] = cells
            .try_into()
            .map_err(|_| MoveError::InvalidGrid { len })?;
        Ok(Self { cells })
    }
}

impl From<Grid> for Vec<Cell> {
    fn from(grid: Grid) -> Self {
        grid.cells.to_vec()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(SIZE) {
            for cell in row {
                let ch = match cell {
                    Cell::Empty => '.',
                    Cell::X => 'X',
                    Cell::O => 'O',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// 连线在棋盘上的形状，前端据此绘制删除线。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LineKind {
    Row { row: usize },
    Column { column: usize },
    Diagonal,
    AntiDiagonal,
}

/// 一条获胜连线的三个格子下标。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Line {
    pub cells: [usize; 3],
}

impl Line {
    pub const fn new(cells: [usize; 3]) -> Self {
        Self { cells }
    }

    pub fn kind(&self) -> LineKind {
        let [a, b, c] = self.cells;
        if a / SIZE == b / SIZE && b / SIZE == c / SIZE {
            LineKind::Row { row: a / SIZE }
        } else if a % SIZE == b % SIZE && b % SIZE == c % SIZE {
            LineKind::Column { column: a % SIZE }
        } else if a == 0 {
            LineKind::Diagonal
        } else {
            LineKind::AntiDiagonal
        }
    }
}

/// 评估结果：某一方获胜、平局或尚未结束。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Verdict {
    Winner { side: Side },
    Draw,
    Undetermined,
}

impl Verdict {
    pub fn is_decided(self) -> bool {
        !matches!(self, Verdict::Undetermined)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    NotStarted,
    InProgress,
    Over,
}

/// 一局对局的完整状态。前端只持有这一份可变副本，通过 `RuleEngine` 的命令推进。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub grid: Grid,
    pub phase: GamePhase,
    pub human: Side,
    pub computer: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_mover: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_line: Option<Line>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            grid: Grid::new(),
            phase: GamePhase::NotStarted,
            human: Side::X,
            computer: Side::O,
            next_mover: None,
            outcome: None,
            winning_line: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Over
    }

    pub fn is_computer_turn(&self) -> bool {
        self.phase == GamePhase::InProgress && self.next_mover == Some(self.computer)
    }

    pub fn is_human_turn(&self) -> bool {
        self.phase == GamePhase::InProgress && self.next_mover == Some(self.human)
    }

    /// 对局结束后展示给玩家的结果文案。
    pub fn result_message(&self) -> Option<&'static str> {
        match self.outcome? {
            Verdict::Winner { side: Side::X } => Some("Player X wins!"),
            Verdict::Winner { side: Side::O } => Some("Player O wins!"),
            Verdict::Draw => Some("It's a draw"),
            Verdict::Undetermined => None,
        }
    }

    pub fn winning_line_kind(&self) -> Option<LineKind> {
        self.winning_line.map(|line| line.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_maps_to_row_major_lines() {
        assert_eq!(WINNING_LINES[0].kind(), LineKind::Row { row: 0 });
        assert_eq!(WINNING_LINES[2].kind(), LineKind::Row { row: 2 });
        assert_eq!(WINNING_LINES[4].kind(), LineKind::Column { column: 1 });
        assert_eq!(WINNING_LINES[6].kind(), LineKind::Diagonal);
        assert_eq!(WINNING_LINES[7].kind(), LineKind::AntiDiagonal);
    }

    #[test]
    fn parse_reads_row_major_layout() {
        let grid = Grid::parse("XX_OO____").expect("layout should parse");
        assert_eq!(grid.get(0), Some(Cell::X));
        assert_eq!(grid.get(2), Some(Cell::Empty));
        assert_eq!(grid.get(4), Some(Cell::O));
        assert_eq!(grid.get(9), None);
        assert_eq!(grid.occupied_count(), 4);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            Grid::parse("XO"),
            Err(MoveError::InvalidGrid { len: 2 })
        );
    }

    #[test]
    fn grid_json_uses_null_for_empty_cells() {
        let grid = Grid::parse("X___O____").expect("layout should parse");
        let json = serde_json::to_string(&grid).expect("grid should serialize");
        assert_eq!(json, r#"["X",null,null,null,"O",null,null,null,null]"#);

        let back: Grid = serde_json::from_str(&json).expect("grid should deserialize");
        assert_eq!(back, grid);
    }

    #[test]
    fn short_cell_list_reports_its_length() {
        let cells = vec![Cell::X, Cell::Empty, Cell::O];
        assert_eq!(Grid::try_from(cells), Err(MoveError::InvalidGrid { len: 3 }));
    }

    #[test]
    fn display_draws_three_rows() {
        let grid = Grid::parse("XO_ _X_ __O").expect("layout should parse");
        assert_eq!(grid.to_string(), "XO.\n.X.\n..O\n");
    }

    #[test]
    fn grid_json_rejects_short_arrays() {
        let result: Result<Grid, _> = serde_json::from_str(r#"["X", null]"#);
        assert!(result.is_err());
    }

    #[test]
    fn side_parsing_accepts_both_cases() {
        assert_eq!("x".parse::<Side>(), Ok(Side::X));
        assert_eq!("O".parse::<Side>(), Ok(Side::O));
        assert!("Z".parse::<Side>().is_err());
    }

    #[test]
    fn new_state_waits_for_side_selection() {
        let state = GameState::new();
        assert_eq!(state.phase, GamePhase::NotStarted);
        assert!(!state.is_computer_turn());
        assert!(!state.is_human_turn());
        assert_eq!(state.result_message(), None);
    }
}
