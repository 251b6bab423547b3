//! Execution orchestrator
//!
//! [`TopazKernel`] answers the notebook's requests against one live Topaz
//! session. A cell is classified, delivered, waited on and post-processed;
//! interrupts are forwarded and resynchronised, and a session whose child
//! died is replaced by a fresh one.

pub mod exit_code;
pub mod info;

pub use exit_code::{
    detect_exit_code, CommandExitCodeProbe, ExitCodeProbe, PROBE_FAILURE_EXIT_CODE,
};
pub use info::{KernelInfo, LanguageInfo};

use chrono::{DateTime, Local};
use std::sync::Arc;
use uuid::Uuid;

use crate::completion::{CompletionProvider, CompletionReply, CompletionRequest};
use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::messages::{ErrorContent, IopubMessage, IopubSink};
use crate::models::{Command, DeliveryMode, DeliveryPlan, ExecutionResult};
use crate::output::{normalize_newlines, resolve_image, strip_echo, ImageExtractor};
use crate::repl::{InterruptHandle, ReplSpec, ReplWrapper};

/// One live child process
pub struct Session {
    id: Uuid,
    wrapper: ReplWrapper,
    started_at: DateTime<Local>,
}

impl Session {
    async fn start(spec: &ReplSpec, interrupts: &InterruptHandle) -> Result<Self> {
        let wrapper = ReplWrapper::start(spec, interrupts).await?;
        let session = Self {
            id: Uuid::new_v4(),
            wrapper,
            started_at: Local::now(),
        };
        info!("Session {} started", session.id);
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn wrapper(&self) -> &ReplWrapper {
        &self.wrapper
    }
}

/// How the prompt-waits for a cell ended
enum Completion {
    /// One capture per prompt-wait, to post-process
    Captured(Vec<String>),
    /// Nothing to show; the cell is aborted
    Aborted,
}

/// How a session was brought back in step after a failed prompt-wait
enum Resync {
    /// The child was interrupted back to its prompt, or replaced
    Abandoned,
    /// The child died; carries its last output and the restart notice
    Restarted(String),
}

/// The notebook-facing kernel
pub struct TopazKernel {
    config: KernelConfig,
    spec: ReplSpec,
    session: Session,
    interrupts: InterruptHandle,
    sink: Arc<dyn IopubSink>,
    images: ImageExtractor,
    completion: CompletionProvider,
    exit_code_probe: Option<Box<dyn ExitCodeProbe>>,
    execution_count: u64,
}

impl TopazKernel {
    /// Validate `config`, start Topaz and log in.
    ///
    /// Fails if the child cannot be spawned or never reaches its prompts.
    pub async fn start(config: KernelConfig, sink: Arc<dyn IopubSink>) -> Result<Self> {
        config.validate()?;
        let spec = ReplSpec::from_config(&config);
        let interrupts = InterruptHandle::new();
        let images = ImageExtractor::new(&config.images.marker)?;
        let completion = CompletionProvider::new(&config.completion);
        let exit_code_probe = config.execution.exit_code_command.as_ref().map(|query| {
            Box::new(CommandExitCodeProbe::new(
                query.clone(),
                config.execution.completion_timeout(),
            )) as Box<dyn ExitCodeProbe>
        });

        let session = Session::start(&spec, &interrupts).await.map_err(|e| {
            error!("Topaz failed to start: {}", e);
            e
        })?;

        Ok(Self {
            config,
            spec,
            session,
            interrupts,
            sink,
            images,
            completion,
            exit_code_probe,
            execution_count: 0,
        })
    }

    /// Replace the exit code capability
    pub fn with_exit_code_probe(mut self, probe: Box<dyn ExitCodeProbe>) -> Self {
        self.exit_code_probe = Some(probe);
        self
    }

    /// A handle that cancels the cell currently executing
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupts.clone()
    }

    pub fn interrupt(&self) {
        self.interrupts.interrupt();
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Run one cell, publishing its output, and return its status record
    pub async fn execute(
        &mut self,
        code: &str,
        silent: bool,
        store_history: bool,
    ) -> Result<ExecutionResult> {
        if self.session.wrapper.terminated() {
            warn!("Session {} is dead, restarting before execution", self.session.id);
            self.restart_session().await?;
        }

        if !silent && store_history {
            self.execution_count += 1;
        }
        let count = self.execution_count;

        let command = Command::new(code);
        let plan = match command.mode() {
            DeliveryMode::NoOp => return Ok(ExecutionResult::ok(count)),
            DeliveryMode::Rejected => {
                info!("Rejected command: {:?}", command.text().trim());
                self.sink
                    .publish(IopubMessage::stdout(self.config.execution.rejection_message.clone()));
                return Ok(ExecutionResult::abort(count));
            }
            DeliveryMode::Direct | DeliveryMode::RawMultilineUntilSentinel => {
                match command.delivery_plan() {
                    Some(plan) => plan,
                    None => return Ok(ExecutionResult::ok(count)),
                }
            }
        };

        let captures = match self.deliver(&plan, silent).await? {
            Completion::Captured(captures) => captures,
            Completion::Aborted => return Ok(ExecutionResult::abort(count)),
        };

        if !silent {
            self.publish_output(&captures, &plan);
        }

        let probed =
            detect_exit_code(self.exit_code_probe.as_deref(), &mut self.session.wrapper).await;
        let exit_code = match probed {
            Ok(code) => code,
            Err(e) => match self.resynchronise(e, silent).await? {
                Resync::Abandoned => return Ok(ExecutionResult::abort(count)),
                Resync::Restarted(_) => {
                    if !silent {
                        self.sink.publish(IopubMessage::stdout(
                            self.config.execution.restart_notice.clone(),
                        ));
                    }
                    PROBE_FAILURE_EXIT_CODE
                }
            },
        };
        if exit_code != 0 {
            let value = exit_code.to_string();
            self.sink.publish(IopubMessage::Error(ErrorContent {
                execution_count: count,
                ename: String::new(),
                evalue: value.clone(),
                traceback: Vec::new(),
            }));
            return Ok(ExecutionResult::error(count, value));
        }

        Ok(ExecutionResult::ok(count))
    }

    /// Write `plan`, waiting for the prompt after each command, and recover
    /// from interrupts, timeouts and a dying child
    async fn deliver(&mut self, plan: &DeliveryPlan, silent: bool) -> Result<Completion> {
        let timeout = self.config.execution.timeout();
        let mut captures = Vec::with_capacity(plan.commands.len());
        let mut failure = None;

        for line in &plan.raw_lines {
            if let Err(e) = self.session.wrapper.send_raw_line(line) {
                failure = Some(e);
                break;
            }
        }
        if failure.is_none() {
            for command in &plan.commands {
                match self.session.wrapper.run_command(command, timeout).await {
                    Ok(capture) => captures.push(capture),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        let Some(e) = failure else {
            return Ok(Completion::Captured(captures));
        };
        match self.resynchronise(e, silent).await? {
            Resync::Abandoned => Ok(Completion::Aborted),
            Resync::Restarted(notice) => {
                captures.push(notice);
                Ok(Completion::Captured(captures))
            }
        }
    }

    /// Bring the session back in step after a prompt-wait that did not end
    /// on the prompt. Other errors are returned unchanged.
    async fn resynchronise(&mut self, error: Error, silent: bool) -> Result<Resync> {
        match error {
            Error::Interrupted { partial } => {
                info!("Interrupted after {} bytes of output", partial.len());
                self.recover_from_interrupt().await?;
                Ok(Resync::Abandoned)
            }
            Error::PromptTimeout { waited, .. } => {
                warn!("Timed out after {:?}", waited);
                self.recover_from_interrupt().await?;
                if !silent {
                    self.sink.publish(IopubMessage::stdout(format!(
                        "Execution timed out after {:.1}s",
                        waited.as_secs_f64()
                    )));
                }
                Ok(Resync::Abandoned)
            }
            Error::EndOfStream { before } => {
                warn!("Topaz ended during execution");
                let notice = format!("{}{}", before, self.config.execution.restart_notice);
                self.restart_session().await?;
                Ok(Resync::Restarted(notice))
            }
            e => Err(e),
        }
    }

    /// Forward an interrupt to the child; replace the session if it does not
    /// come back to its prompt
    async fn recover_from_interrupt(&mut self) -> Result<()> {
        let timeout = self.config.execution.interrupt_recovery_timeout();
        match self.session.wrapper.interrupt(timeout).await {
            Ok(drained) => {
                trace!("Discarded {} bytes drained after interrupt", drained.len());
                Ok(())
            }
            Err(e) => {
                warn!("Topaz did not recover from interrupt ({}), restarting", e);
                self.restart_session().await
            }
        }
    }

    /// Publish one stream message for all captures, then the images they
    /// referenced in order
    fn publish_output(&self, captures: &[String], plan: &DeliveryPlan) {
        let mut references = Vec::new();
        let mut segments = Vec::new();
        for (capture, echo) in captures.iter().zip(plan.echoes()) {
            let without_prompt = self.session.wrapper.prompt().strip_from(capture);
            let (found, cleaned) = self.images.extract(without_prompt);
            references.extend(found);
            let text = normalize_newlines(strip_echo(&cleaned, &echo));
            if !text.is_empty() {
                segments.push(text);
            }
        }
        self.sink.publish(IopubMessage::stdout(segments.join("\n")));

        for reference in references {
            match resolve_image(&reference, self.config.images.remove_after_display) {
                Ok(data) => self.sink.publish(IopubMessage::DisplayData(data)),
                Err(e) => {
                    warn!("Image {} not displayed: {}", reference.path.display(), e);
                    self.sink.publish(IopubMessage::stdout(e.to_string()));
                }
            }
        }
    }

    /// Candidates for the token before `cursor_pos`. Never fails; problems
    /// produce an empty reply.
    pub async fn complete(&mut self, code: &str, cursor_pos: usize) -> CompletionReply {
        let Some(request) = CompletionRequest::parse(code, cursor_pos) else {
            return CompletionReply::empty(cursor_pos);
        };
        if self.session.wrapper.terminated() {
            return CompletionReply::empty(cursor_pos);
        }

        let timeout = self.config.execution.completion_timeout();
        match self
            .completion
            .complete(&mut self.session.wrapper, &request, timeout)
            .await
        {
            Ok(reply) => reply,
            Err(Error::Interrupted { .. }) | Err(Error::PromptTimeout { .. }) => {
                if let Err(e) = self.recover_from_interrupt().await {
                    error!("Session could not be restored after completion: {}", e);
                }
                CompletionReply::empty(cursor_pos)
            }
            Err(e) => {
                warn!("Completion failed: {}", e);
                CompletionReply::empty(cursor_pos)
            }
        }
    }

    /// Stop the child; with `restart`, start a fresh session
    pub async fn shutdown(&mut self, restart: bool) -> Result<()> {
        info!("Shutting down session {} (restart: {})", self.session.id, restart);
        self.session
            .wrapper
            .terminate(self.config.execution.shutdown_grace())
            .await;
        if restart {
            self.restart_session().await?;
        }
        Ok(())
    }

    /// Identity and Topaz version
    pub async fn kernel_info(&self) -> KernelInfo {
        KernelInfo::probe(&self.config.topaz).await
    }

    async fn restart_session(&mut self) -> Result<()> {
        info!("Restarting Topaz (session {})", self.session.id);
        let fresh = Session::start(&self.spec, &self.interrupts).await?;
        let dead = std::mem::replace(&mut self.session, fresh);
        debug!(
            "Session {} replaced by {} after {}s",
            dead.id,
            self.session.id,
            (Local::now() - dead.started_at).num_seconds()
        );
        Ok(())
    }
}
