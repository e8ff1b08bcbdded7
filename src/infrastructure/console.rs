//! Terminal driver for a session
//!
//! Prints the log as it grows, streams the text of the call in flight and
//! reads human actions and pause/failure choices from stdin. Ctrl-C requests
//! a pause, honored before the next narration or AI turn.

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use crate::application::ports::outbound::LlmPort;
use crate::application::services::llm::prompt_builder::format_character_status;
use crate::application::services::{LiveText, SessionStatus, TurnOrchestrator};
use crate::domain::events::{GameEvent, GameEventKind};
use crate::domain::value_objects::ActionType;

pub struct ConsoleDriver<L: LlmPort> {
    orchestrator: TurnOrchestrator<L>,
    live: watch::Receiver<Option<LiveText>>,
    /// Log entries already on screen
    printed: usize,
    /// Round whose status block was last shown
    shown_round: u32,
}

impl<L: LlmPort> ConsoleDriver<L> {
    pub fn new(orchestrator: TurnOrchestrator<L>) -> Self {
        let live = orchestrator.subscribe_live();
        Self {
            orchestrator,
            live,
            printed: 0,
            shown_round: 0,
        }
    }

    /// Run the session until it ends or the user quits
    pub async fn run(mut self) -> Result<()> {
        let pause = self.orchestrator.pause_handle();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                pause.request_pause();
                eprintln!("\n[暂停] 当前请求完成后暂停……");
            }
        });

        let mut input = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let status = self.orchestrator.status().clone();
            match status {
                SessionStatus::Ready => {
                    self.print_round_header();
                    let streamed = with_live(&mut self.live, self.orchestrator.advance()).await.1;
                    self.print_new_events(streamed);
                }
                SessionStatus::AwaitingHuman { character_id } => {
                    self.print_round_header();
                    let name = self
                        .orchestrator
                        .state()
                        .character(&character_id)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| character_id.to_string());
                    println!(
                        "\n轮到 {} 行动。输入 <类型> <描述>，类型：{}",
                        name,
                        ActionType::ALL.map(|t| t.as_str()).join("/")
                    );
                    let Some(line) = read_line(&mut input).await? else {
                        return Ok(());
                    };
                    match parse_human_input(&line) {
                        Some((action_type, description)) => {
                            if let Err(e) = self.orchestrator.submit_human_action(action_type, &description) {
                                println!("{}", e);
                            }
                            self.print_new_events(None);
                        }
                        None => println!("请描述你的行动。"),
                    }
                }
                SessionStatus::Paused => {
                    println!("\n已暂停。输入 r 继续，reset 重新开始，q 退出：");
                    match read_line(&mut input).await?.as_deref().map(str::trim) {
                        None | Some("q") => return Ok(()),
                        Some("r") => self.orchestrator.resume(),
                        Some("reset") => self.reset(),
                        Some(_) => {}
                    }
                }
                SessionStatus::Failed { message } => {
                    println!("\n请求失败：{}\n输入 r 重试，reset 重新开始，q 退出：", message);
                    match read_line(&mut input).await?.as_deref().map(str::trim) {
                        None | Some("q") => return Ok(()),
                        Some("r") => {
                            let (result, streamed) =
                                with_live(&mut self.live, self.orchestrator.retry()).await;
                            if let Err(e) = result {
                                println!("{}", e);
                            }
                            self.print_new_events(streamed);
                        }
                        Some("reset") => self.reset(),
                        Some(_) => {}
                    }
                }
                SessionStatus::GameOver { survivor } => {
                    self.print_new_events(None);
                    tracing::info!(survivor = ?survivor, "Session finished");
                    return Ok(());
                }
            }
        }
    }

    fn reset(&mut self) {
        self.orchestrator.reset();
        self.printed = 0;
        self.shown_round = 0;
        println!("\n══════ 重新开始 ══════");
    }

    fn print_round_header(&mut self) {
        let state = self.orchestrator.state();
        if state.round == self.shown_round {
            return;
        }
        self.shown_round = state.round;
        println!("\n══════ 第{}轮 ══════", state.round);
        for character in &state.characters {
            println!("{}", format_character_status(character));
        }
    }

    /// Print log entries appended since the last call
    ///
    /// `streamed` is how many bytes of the call's text are already on screen.
    /// The model-written event that call produced is completed rather than
    /// printed again.
    fn print_new_events(&mut self, mut streamed: Option<usize>) {
        let log = &self.orchestrator.state().log;
        for event in log.iter().skip(self.printed) {
            if is_model_text(event.kind) {
                if let Some(shown) = streamed.take() {
                    println!("{}", event.content.get(shown..).unwrap_or_default());
                    continue;
                }
            }
            println!("{}", format_event(event));
        }
        if streamed.is_some() {
            println!();
        }
        self.printed = log.len();
    }
}

/// Await `fut` while echoing live text
///
/// Returns the output and, if anything was echoed, how many bytes were shown.
async fn with_live<F: Future>(
    live: &mut watch::Receiver<Option<LiveText>>,
    fut: F,
) -> (F::Output, Option<usize>) {
    tokio::pin!(fut);
    let mut shown = 0usize;
    let mut streamed = false;
    let mut stdout = std::io::stdout();

    let output = loop {
        tokio::select! {
            output = &mut fut => break output,
            Ok(()) = live.changed() => {
                let current = live.borrow_and_update().clone();
                match current {
                    Some(live_text) if !live_text.text.is_empty() => {
                        if !streamed {
                            print!("\n【{}】", live_text.speaker);
                            streamed = true;
                        }
                        let text = live_text.text.as_str();
                        if shown <= text.len() && text.is_char_boundary(shown) {
                            print!("{}", &text[shown..]);
                        } else {
                            print!("\n{}", text);
                        }
                        shown = text.len();
                        stdout.flush().ok();
                    }
                    _ => {}
                }
            }
        }
    };

    (output, streamed.then_some(shown))
}

async fn read_line(input: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    std::io::stdout().flush().ok();
    Ok(input.next_line().await?)
}

fn is_model_text(kind: GameEventKind) -> bool {
    matches!(
        kind,
        GameEventKind::Narration | GameEventKind::Action | GameEventKind::Result
    )
}

/// Parse `<type> <description>`; a line without a known type is a custom action
pub fn parse_human_input(line: &str) -> Option<(ActionType, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((head, rest)) = line.split_once(char::is_whitespace) {
        if let Ok(action_type) = head.parse::<ActionType>() {
            let description = rest.trim();
            return (!description.is_empty()).then(|| (action_type, description.to_string()));
        }
    } else if line.parse::<ActionType>().is_ok() {
        return None;
    }

    Some((ActionType::Custom, line.to_string()))
}

pub fn format_event(event: &GameEvent) -> String {
    match event.kind {
        GameEventKind::Narration => format!("\n【{}】{}", event.speaker, event.content),
        GameEventKind::Action | GameEventKind::User => format!("【{}】{}", event.speaker, event.content),
        GameEventKind::Roll => format!("  [骰子] {}", event.content),
        GameEventKind::Result => format!("\n【{} 裁定】{}", event.speaker, event.content),
        GameEventKind::System => format!("[{}] {}", event.speaker, event.content),
    }
}
