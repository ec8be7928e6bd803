//! Scripted `Runner` for orchestration tests.
//!
//! Records every invocation and answers the way the real tools would:
//! `ssh-agent -s` prints a banner, `keyctl` keeps an in-memory keyring,
//! `sh -c` looks up canned generator output, and borg/rclone succeed unless
//! a rule says otherwise.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use syborg::core::process::{Chunk, Interactive, Invocation, Output, Runner};
use syborg::error::Result;

/// Pid announced by the fake agent.
pub const AGENT_PID: u32 = 4242;

/// Socket announced by the fake agent.
pub const AGENT_SOCK: &str = "/tmp/syborg-test/agent.sock";

type Rule = Box<dyn Fn(&Invocation) -> Option<Output>>;

/// A `Runner` that never starts a process.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<Invocation>>,
    rules: RefCell<Vec<Rule>>,
    generators: RefCell<BTreeMap<String, VecDeque<String>>>,
    keys: RefCell<BTreeMap<String, (u32, String)>>,
    next_key: Cell<u32>,
    terminated: RefCell<Vec<u32>>,
    ssh_passphrase: RefCell<Option<String>>,
    typed: Rc<RefCell<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        let runner = Self::default();
        runner.next_key.set(100);
        runner
    }

    /// `sh -c <command>` prints `outputs` in turn; the last one repeats.
    pub fn generator(&self, command: &str, outputs: &[&str]) -> &Self {
        self.generators.borrow_mut().insert(
            command.to_string(),
            outputs.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Pre-populate the keyring as if `command` had been validated before.
    pub fn cached(&self, command: &str, secret: &str) -> &Self {
        let id = self.next_key.get();
        self.next_key.set(id + 1);
        self.keys.borrow_mut().insert(
            syborg::core::keyring::key_name(command),
            (id, secret.to_string()),
        );
        self
    }

    /// Answer invocations `rule` returns `Some` for.
    pub fn rule(&self, rule: impl Fn(&Invocation) -> Option<Output> + 'static) -> &Self {
        self.rules.borrow_mut().push(Box::new(rule));
        self
    }

    /// Make every invocation whose command line starts with `prefix` exit
    /// with `code`.
    pub fn fail(&self, prefix: &str, code: i32) -> &Self {
        let prefix = prefix.to_string();
        self.rule(move |inv| {
            inv.command_line().starts_with(&prefix).then(|| exited(code))
        })
    }

    /// Passphrase the fake ssh-add accepts.
    pub fn ssh_key_passphrase(&self, passphrase: &str) -> &Self {
        *self.ssh_passphrase.borrow_mut() = Some(passphrase.to_string());
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Command lines of every invocation so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Invocation::command_line).collect()
    }

    /// Command lines starting with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.command_lines()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    /// Invocations of `program` whose first argument is `subcommand`.
    pub fn calls_to(&self, program: &str, subcommand: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.program == program && inv.args.first().map(String::as_str) == Some(subcommand))
            .cloned()
            .collect()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.borrow().clone()
    }

    /// Secret cached for `command`, if any.
    pub fn stored(&self, command: &str) -> Option<String> {
        self.keys
            .borrow()
            .get(&syborg::core::keyring::key_name(command))
            .map(|(_, secret)| secret.clone())
    }

    /// Lines typed into ssh-add.
    pub fn typed(&self) -> Vec<String> {
        self.typed.borrow().clone()
    }

    fn keyctl(&self, inv: &Invocation) -> Output {
        let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["search", "@u", "user", name] => match self.keys.borrow().get(*name) {
                Some((id, _)) => printed(&format!("{}\n", id)),
                None => exited(1),
            },
            ["padd", "user", name, "@s"] => {
                let id = self.next_key.get();
                self.next_key.set(id + 1);
                let secret = inv
                    .stdin
                    .as_ref()
                    .map(|s| s.trim_end_matches('\n').to_string())
                    .unwrap_or_default();
                self.keys.borrow_mut().insert(name.to_string(), (id, secret));
                printed(&format!("{}\n", id))
            }
            ["pipe", id] => self.pipe(id),
            ["setperm" | "timeout" | "link" | "unlink", ..] => exited(0),
            _ => exited(1),
        }
    }

    fn pipe(&self, id: &str) -> Output {
        self.keys
            .borrow()
            .values()
            .find(|(key_id, _)| key_id.to_string() == id)
            .map(|(_, secret)| printed(secret))
            .unwrap_or_else(|| exited(1))
    }

    fn shell(&self, command: &str) -> Output {
        if let Some(id) = command.strip_prefix("keyctl pipe ") {
            return self.pipe(id.trim());
        }
        let mut generators = self.generators.borrow_mut();
        match generators.get_mut(command) {
            Some(outputs) if outputs.len() > 1 => printed(&outputs.pop_front().unwrap_or_default()),
            Some(outputs) => printed(outputs.front().map(String::as_str).unwrap_or_default()),
            None => exited(127),
        }
    }
}

impl Runner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());

        for rule in self.rules.borrow().iter() {
            if let Some(output) = rule(invocation) {
                return Ok(output);
            }
        }

        Ok(match invocation.program.as_str() {
            "ssh-agent" => printed(&format!(
                "SSH_AUTH_SOCK={sock}; export SSH_AUTH_SOCK;\nSSH_AGENT_PID={pid}; export SSH_AGENT_PID;\necho Agent pid {pid};\n",
                sock = AGENT_SOCK,
                pid = AGENT_PID
            )),
            "keyctl" => self.keyctl(invocation),
            "sh" => self.shell(invocation.args.get(1).map(String::as_str).unwrap_or_default()),
            _ => exited(0),
        })
    }

    fn spawn_interactive(&self, invocation: &Invocation) -> Result<Box<dyn Interactive>> {
        self.calls.borrow_mut().push(invocation.clone());
        let passphrase = self.ssh_passphrase.borrow().clone().unwrap_or_default();
        Ok(Box::new(FakeSshAdd::new(passphrase, self.typed.clone())))
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        self.terminated.borrow_mut().push(pid);
        Ok(())
    }
}

/// ssh-add that accepts exactly one passphrase.
pub struct FakeSshAdd {
    passphrase: String,
    pending: VecDeque<String>,
    typed: Rc<RefCell<Vec<String>>>,
    added: bool,
}

impl FakeSshAdd {
    pub fn new(passphrase: String, typed: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            passphrase,
            pending: VecDeque::from(["Enter passphrase for /home/user/.ssh/id_ed25519: ".to_string()]),
            typed,
            added: false,
        }
    }
}

impl Interactive for FakeSshAdd {
    fn program(&self) -> &str {
        "ssh-add"
    }

    fn read_chunk(&mut self, _timeout: Duration) -> Result<Chunk> {
        Ok(match self.pending.pop_front() {
            Some(data) => Chunk::Data(data),
            None if self.added => Chunk::Eof,
            None => Chunk::Timeout,
        })
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.typed.borrow_mut().push(line.to_string());
        if line == self.passphrase {
            self.added = true;
            self.pending.push_back(
                "\r\nIdentity added: /home/user/.ssh/id_ed25519 (user@host)\r\n".to_string(),
            );
        } else {
            self.pending.push_back(
                "\r\nBad passphrase, try again for /home/user/.ssh/id_ed25519: ".to_string(),
            );
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        Ok(Some(if self.added { 0 } else { 1 }))
    }
}

pub fn exited(code: i32) -> Output {
    Output {
        code: Some(code),
        stdout: String::new(),
    }
}

pub fn printed(text: &str) -> Output {
    Output {
        code: Some(0),
        stdout: text.to_string(),
    }
}
