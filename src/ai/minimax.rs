use std::str::FromStr;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{empty_cells, is_empty, winner, Grid, MoveError, Side, Verdict};

pub const WIN_SCORE: i32 = 10;
pub const LOSS_SCORE: i32 = -10;
pub const DRAW_SCORE: i32 = 0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" | "normal" => Ok(AiDifficulty::Medium),
            "hard" | "difficult" => Ok(AiDifficulty::Hard),
            _ => Err(MoveError::InvalidDifficulty {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    /// 中等难度下走 minimax 的概率，其余情况随机落子。
    pub smart_move_chance: f64,
    /// 电脑落子前的停顿，只影响展示节奏。
    pub move_delay: Duration,
    /// 终局后弹出结果前的停顿。
    pub result_delay: Duration,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let smart_move_chance = match difficulty {
            AiDifficulty::Easy => 0.0,
            AiDifficulty::Medium => 0.5,
            AiDifficulty::Hard => 1.0,
        };
        Self {
            difficulty,
            smart_move_chance,
            move_delay: Duration::from_millis(500),
            result_delay: Duration::from_millis(300),
        }
    }

    pub fn with_smart_move_chance(mut self, chance: f64) -> Self {
        self.smart_move_chance = sanitize_chance(chance);
        self
    }

    /// 可直接交给 `gen_bool` 的概率：限制在 [0, 1]，非有限值按 0 处理。
    pub fn smart_move_probability(&self) -> f64 {
        sanitize_chance(self.smart_move_chance)
    }
}

fn sanitize_chance(chance: f64) -> f64 {
    if chance.is_finite() {
        chance.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Easy)
    }
}

/// minimax 的结果。只有无子可下的终局节点才会返回 `index: None`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i32>,
    pub searched: bool,
    pub nodes: u64,
    pub difficulty: AiDifficulty,
}

struct SearchStats {
    nodes: u64,
}

impl SearchStats {
    fn new() -> Self {
        Self { nodes: 0 }
    }
}

/// 为 `side` 搜索最佳落子。得分以 `side` 的视角计算：胜 +10，负 -10，平 0，不按深度折算。
pub fn minimax<R: Rng + ?Sized>(
    grid: &Grid,
    side: Side,
    rng: &mut R,
) -> Result<SearchResult, MoveError> {
    let mut stats = SearchStats::new();
    search_root(grid, side, rng, &mut stats)
}

/// 随机选一个空格子。
pub fn random_move<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Result<usize, MoveError> {
    empty_cells(grid)
        .choose(rng)
        .copied()
        .ok_or(MoveError::NoEmptyCells)
}

/// 按难度为电脑选一步棋。空棋盘时直接随机，不做搜索。
pub fn choose_computer_move<R: Rng + ?Sized>(
    grid: &Grid,
    side: Side,
    difficulty: AiDifficulty,
    rng: &mut R,
) -> Result<usize, MoveError> {
    let config = AiConfig::from_difficulty(difficulty);
    decide(grid, side, &config, rng).map(|decision| decision.index)
}

fn search_root<R: Rng + ?Sized>(
    grid: &Grid,
    side: Side,
    rng: &mut R,
    stats: &mut SearchStats,
) -> Result<SearchResult, MoveError> {
    ensure_playable(grid)?;
    let result = minimax_rec(*grid, side, side, rng, stats);
    match result.index {
        Some(_) => Ok(result),
        None => Err(MoveError::NoEmptyCells),
    }
}

fn ensure_playable(grid: &Grid) -> Result<(), MoveError> {
    if grid.is_full() {
        return Err(MoveError::NoEmptyCells);
    }
    if winner(grid).is_decided() {
        return Err(MoveError::GameFinished);
    }
    Ok(())
}

fn minimax_rec<R: Rng + ?Sized>(
    grid: Grid,
    to_move: Side,
    root_side: Side,
    rng: &mut R,
    stats: &mut SearchStats,
) -> SearchResult {
    stats.nodes += 1;

    match winner(&grid) {
        Verdict::Winner { side } if side == root_side => {
            return SearchResult {
                score: WIN_SCORE,
                index: None,
            }
        }
        Verdict::Winner { .. } => {
            return SearchResult {
                score: LOSS_SCORE,
                index: None,
            }
        }
        Verdict::Draw => {
            return SearchResult {
                score: DRAW_SCORE,
                index: None,
            }
        }
        Verdict::Undetermined => {}
    }

    let maximizing = to_move == root_side;
    let mut best_score = if maximizing { i32::MIN } else { i32::MAX };
    let mut best_moves: Vec<usize> = Vec::new();

    for index in empty_cells(&grid) {
        // `grid` 是按值传入的副本，兄弟分支互不影响。
        let mut child = grid;
        child.place(index, to_move);
        let score = minimax_rec(child, to_move.opponent(), root_side, rng, stats).score;

        let improves = if maximizing {
            score > best_score
        } else {
            score < best_score
        };
        if improves {
            best_score = score;
            best_moves.clear();
            best_moves.push(index);
        } else if score == best_score {
            best_moves.push(index);
        }
    }

    SearchResult {
        score: best_score,
        index: best_moves.choose(rng).copied(),
    }
}

fn decide<R: Rng + ?Sized>(
    grid: &Grid,
    side: Side,
    config: &AiConfig,
    rng: &mut R,
) -> Result<AiDecision, MoveError> {
    ensure_playable(grid)?;

    let random_decision = |index: usize| AiDecision {
        index,
        evaluation: None,
        searched: false,
        nodes: 0,
        difficulty: config.difficulty,
    };

    if is_empty(grid) {
        return random_move(grid, rng).map(random_decision);
    }

    let smart = match config.difficulty {
        AiDifficulty::Easy => false,
        AiDifficulty::Medium => rng.gen_bool(config.smart_move_probability()),
        AiDifficulty::Hard => true,
    };
    if !smart {
        return random_move(grid, rng).map(random_decision);
    }

    let mut stats = SearchStats::new();
    let result = search_root(grid, side, rng, &mut stats)?;
    let index = result.index.ok_or(MoveError::NoEmptyCells)?;
    log::debug!(
        "minimax for {side} picked cell {index} (score {}, {} nodes)",
        result.score,
        stats.nodes
    );
    Ok(AiDecision {
        index,
        evaluation: Some(result.score),
        searched: true,
        nodes: stats.nodes,
        difficulty: config.difficulty,
    })
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AiConfig) {
        self.config = config;
    }

    pub fn decide_move(&mut self, grid: &Grid, side: Side) -> Result<AiDecision, MoveError> {
        decide(grid, side, &self.config, &mut self.rng)
    }

    /// 派生一个独立的 agent，种子取自本 agent 的随机源，供异步路径使用。
    pub fn fork(&mut self) -> AiAgent {
        AiAgent::with_seed(self.config.clone(), self.rng.gen())
    }
}
