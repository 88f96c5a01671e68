//! 电脑对手：minimax 搜索与难度策略。

pub mod minimax;

pub use minimax::{
    choose_computer_move, minimax, random_move, AiAgent, AiConfig, AiDecision, AiDifficulty,
    SearchResult, DRAW_SCORE, LOSS_SCORE, WIN_SCORE,
};
