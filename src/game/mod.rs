//! 棋盘状态与规则判定（连线表、胜负评估、对局状态机）。

pub mod rules;
pub mod state;

pub use rules::{
    apply_move,
    empty_cells,
    is_empty,
    winner,
    winning_line,
    MoveError,
    MoveResolution,
    RuleEngine,
};
pub use state::{
    Cell,
    GamePhase,
    GameState,
    Grid,
    Line,
    LineKind,
    Side,
    Verdict,
    CELL_COUNT,
    SIZE,
    WINNING_LINES,
};
