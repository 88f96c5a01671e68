use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{GamePhase, GameState, Grid, Line, Side, Verdict, CELL_COUNT, WINNING_LINES};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MoveError {
    #[error("cell index {index} is out of range (must be 0-8)")]
    OutOfRange { index: usize },
    #[error("cell {index} is already occupied")]
    CellOccupied { index: usize },
    #[error("no empty cells left on the grid")]
    NoEmptyCells,
    #[error("game is already decided")]
    GameFinished,
    #[error("game is not in progress")]
    GameNotInProgress,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("it is {expected}'s turn, not {actual}'s")]
    NotPlayerTurn { expected: Side, actual: Side },
    #[error("grid must have 9 cells, got {len}")]
    InvalidGrid { len: usize },
    #[error("invalid side '{value}' (expected 'X' or 'O')")]
    InvalidSide { value: String },
    #[error("invalid difficulty '{value}' (expected easy, medium or hard)")]
    InvalidDifficulty { value: String },
}

/// 所有空格子的下标，按升序排列。
pub fn empty_cells(grid: &Grid) -> Vec<usize> {
    grid.cells()
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.is_empty())
        .map(|(index, _)| index)
        .collect()
}

pub fn is_empty(grid: &Grid) -> bool {
    grid.cells().iter().all(|cell| cell.is_empty())
}

/// 按连线表顺序扫描，返回第一条三子相同的连线。
pub fn winning_line(grid: &Grid) -> Option<Line> {
    let cells = grid.cells();
    WINNING_LINES.iter().copied().find(|line| {
        let [a, b, c] = line.cells;
        !cells[a].is_empty() && cells[a] == cells[b] && cells[b] == cells[c]
    })
}

/// 终局判定的唯一依据。每次落子后都要重新调用，不做缓存。
pub fn winner(grid: &Grid) -> Verdict {
    if let Some(side) = winning_line(grid).and_then(|line| grid.cells()[line.cells[0]].side()) {
        return Verdict::Winner { side };
    }
    if grid.is_full() {
        Verdict::Draw
    } else {
        Verdict::Undetermined
    }
}

/// 在副本上落子并返回新棋盘，原棋盘保持不变。
pub fn apply_move(grid: &Grid, index: usize, side: Side) -> Result<Grid, MoveError> {
    if index >= CELL_COUNT {
        return Err(MoveError::OutOfRange { index });
    }
    if winner(grid).is_decided() {
        return Err(MoveError::GameFinished);
    }
    if !grid.cells()[index].is_empty() {
        return Err(MoveError::CellOccupied { index });
    }
    let mut next = *grid;
    next.place(index, side);
    Ok(next)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveResolution {
    pub grid: Grid,
    pub index: usize,
    pub side: Side,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
}

impl MoveResolution {
    pub fn new(grid: Grid, index: usize, side: Side) -> Self {
        Self {
            grid,
            index,
            side,
            verdict: winner(&grid),
            line: winning_line(&grid),
        }
    }
}

pub struct RuleEngine;

impl RuleEngine {
    /// 无状态落子：校验后返回新棋盘及其评估结果。
    pub fn resolve(grid: &Grid, index: usize, side: Side) -> Result<MoveResolution, MoveError> {
        let next = apply_move(grid, index, side)?;
        Ok(MoveResolution::new(next, index, side))
    }

    /// 玩家选边后开局，X 先行。
    pub fn choose_side(state: &mut GameState, human: Side) -> Result<(), MoveError> {
        if state.phase != GamePhase::NotStarted {
            return Err(MoveError::GameAlreadyStarted);
        }
        state.human = human;
        state.computer = human.opponent();
        state.grid = Grid::new();
        state.phase = GamePhase::InProgress;
        state.next_mover = Some(Side::X);
        state.outcome = None;
        state.winning_line = None;
        log::debug!("game started, human plays {human}");
        Ok(())
    }

    pub fn play(state: &mut GameState, index: usize, side: Side) -> Result<MoveResolution, MoveError> {
        Self::ensure_in_progress(state)?;
        Self::ensure_turn_owner(state, side)?;

        let resolution = Self::resolve(&state.grid, index, side)?;
        state.grid = resolution.grid;
        state.next_mover = Some(side.opponent());
        Self::check_outcome(state);
        log::debug!(
            "{side} played cell {index} (move {}), verdict {:?}\n{}",
            state.grid.occupied_count(),
            resolution.verdict,
            state.grid
        );
        Ok(resolution)
    }

    /// 重新评估当前棋盘；已分胜负或平局时进入结束阶段。
    pub fn check_outcome(state: &mut GameState) -> Verdict {
        let verdict = winner(&state.grid);
        if verdict.is_decided() {
            state.phase = GamePhase::Over;
            state.next_mover = None;
            state.outcome = Some(verdict);
            state.winning_line = winning_line(&state.grid);
            log::info!("game over: {verdict:?}");
        }
        verdict
    }

    /// 回到选边界面，保留双方的执子设置。
    pub fn reset(state: &mut GameState) {
        *state = GameState {
            human: state.human,
            computer: state.computer,
            ..GameState::new()
        };
    }

    fn ensure_in_progress(state: &GameState) -> Result<(), MoveError> {
        if state.phase != GamePhase::InProgress {
            return Err(MoveError::GameNotInProgress);
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, side: Side) -> Result<(), MoveError> {
        match state.next_mover {
            Some(expected) if expected != side => Err(MoveError::NotPlayerTurn {
                expected,
                actual: side,
            }),
            Some(_) => Ok(()),
            None => Err(MoveError::GameNotInProgress),
        }
    }
}
