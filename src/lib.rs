pub mod ai;
pub mod game;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    choose_computer_move, minimax, random_move, AiAgent, AiConfig, AiDecision, AiDifficulty,
    SearchResult,
};
pub use game::{
    apply_move, empty_cells, is_empty, winner, winning_line, Cell, GamePhase, GameState, Grid,
    Line, LineKind, MoveError, MoveResolution, RuleEngine, Side, Verdict, WINNING_LINES,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    init_logging();
}

fn init_logging() {
    if let Err(error) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::warn_1(&JsValue::from_str(&error.to_string()));
    }
}

fn to_js_error(error: MoveError) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn parse_grid(grid: JsValue) -> Result<Grid, JsValue> {
    let cells: Vec<Cell> = from_value(grid).map_err(JsValue::from)?;
    Grid::try_from(cells).map_err(to_js_error)
}

fn parse_side(side: &str) -> Result<Side, JsValue> {
    Side::from_str(side).map_err(to_js_error)
}

fn parse_difficulty(difficulty: Option<&str>) -> AiDifficulty {
    difficulty
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or_default()
}

fn duration_ms(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn ensure_computer_turn(state: &GameState) -> Result<(), MoveError> {
    if state.phase != GamePhase::InProgress {
        return Err(MoveError::GameNotInProgress);
    }
    match state.next_mover {
        Some(side) if side == state.computer => Ok(()),
        Some(expected) => Err(MoveError::NotPlayerTurn {
            expected,
            actual: state.computer,
        }),
        None => Err(MoveError::GameNotInProgress),
    }
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    applied: MoveResolution,
}

/// 一局对局的句柄。前端持有它，按回合调用命令推进状态。
#[wasm_bindgen]
pub struct TicTacToeEngine {
    state: GameState,
    agent: AiAgent,
}

#[wasm_bindgen]
impl TicTacToeEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(difficulty: Option<String>) -> TicTacToeEngine {
        let difficulty = parse_difficulty(difficulty.as_deref());
        TicTacToeEngine {
            state: GameState::new(),
            agent: AiAgent::new(AiConfig::from_difficulty(difficulty)),
        }
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_difficulty(&mut self, difficulty: &str) -> Result<(), JsValue> {
        if self.state.phase == GamePhase::InProgress {
            return Err(to_js_error(MoveError::GameAlreadyStarted));
        }
        let difficulty = AiDifficulty::from_str(difficulty).map_err(to_js_error)?;
        self.agent.set_config(AiConfig::from_difficulty(difficulty));
        log::debug!("difficulty set to {difficulty:?}");
        Ok(())
    }

    pub fn difficulty(&self) -> String {
        serde_json::to_value(self.agent.config().difficulty)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn choose_side(&mut self, side: &str) -> Result<String, JsValue> {
        let side = parse_side(side)?;
        RuleEngine::choose_side(&mut self.state, side).map_err(to_js_error)?;
        self.state_json()
    }

    pub fn is_computer_turn(&self) -> bool {
        self.state.is_computer_turn()
    }

    pub fn is_human_turn(&self) -> bool {
        self.state.is_human_turn()
    }

    pub fn human_move(&mut self, index: usize) -> Result<String, JsValue> {
        let human = self.state.human;
        let resolution = RuleEngine::play(&mut self.state, index, human).map_err(to_js_error)?;
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 立即为电脑计算并落子。
    pub fn computer_move(&mut self) -> Result<String, JsValue> {
        ensure_computer_turn(&self.state).map_err(to_js_error)?;
        let computer = self.state.computer;
        let decision = self
            .agent
            .decide_move(&self.state.grid, computer)
            .map_err(to_js_error)?;
        let applied =
            RuleEngine::play(&mut self.state, decision.index, computer).map_err(to_js_error)?;

        let response = AiMoveResponse { decision, applied };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    /// 落下 `think` 算出的那一步。
    pub fn apply_computer_move(&mut self, index: usize) -> Result<String, JsValue> {
        ensure_computer_turn(&self.state).map_err(to_js_error)?;
        let computer = self.state.computer;
        let resolution = RuleEngine::play(&mut self.state, index, computer).map_err(to_js_error)?;
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 等待 `delay_ms`（默认取配置中的落子停顿）后返回电脑的决策，不修改对局状态。
    /// 随机源从引擎自身的 agent 派生，同一种子下结果可复现。
    pub fn think(&mut self, delay_ms: Option<u32>) -> Promise {
        let grid = self.state.grid;
        let computer = self.state.computer;
        let turn = ensure_computer_turn(&self.state);
        let mut agent = self.agent.fork();
        let delay = delay_ms.unwrap_or_else(|| duration_ms(agent.config().move_delay));

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            turn.map_err(to_js_error)?;
            let decision = agent.decide_move(&grid, computer).map_err(to_js_error)?;
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn reset(&mut self) {
        RuleEngine::reset(&mut self.state);
    }

    pub fn result_message(&self) -> Option<String> {
        self.state.result_message().map(str::to_string)
    }

    pub fn strike_through(&self) -> Result<JsValue, JsValue> {
        to_value(&self.state.winning_line_kind()).map_err(JsValue::from)
    }

    pub fn move_delay_ms(&self) -> u32 {
        duration_ms(self.agent.config().move_delay)
    }

    pub fn result_delay_ms(&self) -> u32 {
        duration_ms(self.agent.config().result_delay)
    }
}

#[wasm_bindgen(js_name = "getWinner")]
pub fn get_winner(grid: JsValue) -> Result<JsValue, JsValue> {
    let grid = parse_grid(grid)?;
    to_value(&winner(&grid)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "winningLine")]
pub fn winning_line_js(grid: JsValue) -> Result<JsValue, JsValue> {
    let grid = parse_grid(grid)?;
    to_value(&winning_line(&grid)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "emptyCells")]
pub fn empty_cells_js(grid: JsValue) -> Result<JsValue, JsValue> {
    let grid = parse_grid(grid)?;
    to_value(&empty_cells(&grid)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "isEmpty")]
pub fn is_empty_js(grid: JsValue) -> Result<bool, JsValue> {
    let grid = parse_grid(grid)?;
    Ok(is_empty(&grid))
}

#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move_js(grid: JsValue, index: usize, side: &str) -> Result<JsValue, JsValue> {
    let grid = parse_grid(grid)?;
    let side = parse_side(side)?;
    let resolution = RuleEngine::resolve(&grid, index, side).map_err(to_js_error)?;
    to_value(&resolution).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "chooseComputerMove")]
pub fn choose_computer_move_js(
    grid: JsValue,
    side: &str,
    difficulty: Option<String>,
) -> Result<usize, JsValue> {
    let grid = parse_grid(grid)?;
    let side = parse_side(side)?;
    let difficulty = parse_difficulty(difficulty.as_deref());
    let mut agent = AiAgent::new(AiConfig::from_difficulty(difficulty));
    let decision = agent.decide_move(&grid, side).map_err(to_js_error)?;
    Ok(decision.index)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computer_turn_gate_follows_next_mover() {
        let mut state = GameState::new();
        assert_eq!(
            ensure_computer_turn(&state),
            Err(MoveError::GameNotInProgress)
        );

        RuleEngine::choose_side(&mut state, Side::X).expect("side selection should succeed");
        assert_eq!(
            ensure_computer_turn(&state),
            Err(MoveError::NotPlayerTurn {
                expected: Side::X,
                actual: Side::O
            })
        );

        RuleEngine::play(&mut state, 4, Side::X).expect("human opening");
        assert_eq!(ensure_computer_turn(&state), Ok(()));
    }

    #[test]
    fn unknown_difficulty_falls_back_to_easy() {
        assert_eq!(parse_difficulty(None), AiDifficulty::Easy);
        assert_eq!(parse_difficulty(Some("hard")), AiDifficulty::Hard);
        assert_eq!(parse_difficulty(Some("impossible")), AiDifficulty::Easy);
    }

    #[test]
    fn engine_plays_a_full_game_against_itself() {
        let mut engine = TicTacToeEngine {
            state: GameState::new(),
            agent: AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Hard), 17),
        };
        RuleEngine::choose_side(&mut engine.state, Side::O).expect("side selection");

        let mut human_bot = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Hard), 23);
        while !engine.state.is_finished() {
            if engine.state.is_computer_turn() {
                let computer = engine.state.computer;
                let decision = engine
                    .agent
                    .decide_move(&engine.state.grid, computer)
                    .expect("computer has a move");
                RuleEngine::play(&mut engine.state, decision.index, computer)
                    .expect("computer move is legal");
            } else {
                let human = engine.state.human;
                let decision = human_bot
                    .decide_move(&engine.state.grid, human)
                    .expect("human has a move");
                RuleEngine::play(&mut engine.state, decision.index, human)
                    .expect("human move is legal");
            }
        }

        assert_eq!(engine.state.outcome, Some(Verdict::Draw));
        assert_eq!(engine.result_message().as_deref(), Some("It's a draw"));
        assert_eq!(engine.move_delay_ms(), 500);
        assert_eq!(engine.result_delay_ms(), 300);
    }

    #[test]
    fn difficulty_name_is_lowercase() {
        let engine = TicTacToeEngine {
            state: GameState::new(),
            agent: AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Medium), 1),
        };
        assert_eq!(engine.difficulty(), "medium");
    }
}
