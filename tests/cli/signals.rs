//! Termination signals while an agent session is open.

use std::path::Path;
use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::skip_without_tool;
use crate::support::*;

/// Starts a detached sleeper as the "agent" and announces its pid.
fn agent_script(dir: &Path) -> String {
    format!(
        "#!/bin/sh\n\
         sleep 300 </dev/null >/dev/null 2>&1 &\n\
         echo \"$!\" > \"{dir}/agent.pid.tmp\" && mv \"{dir}/agent.pid.tmp\" \"{dir}/agent.pid\"\n\
         echo \"SSH_AUTH_SOCK={dir}/agent.sock; export SSH_AUTH_SOCK;\"\n\
         echo \"SSH_AGENT_PID=$!; export SSH_AGENT_PID;\"\n\
         echo \"echo Agent pid $!;\"\n",
        dir = dir.display()
    )
}

/// Announces itself, then blocks like a long `borg list`.
fn borg_script(dir: &Path) -> String {
    format!(
        "#!/bin/sh\n\
         echo \"$$\" > \"{dir}/borg.pid.tmp\" && mv \"{dir}/borg.pid.tmp\" \"{dir}/borg.pid\"\n\
         exec sleep 30\n",
        dir = dir.display()
    )
}

fn wait_for_pid(path: &Path, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(pid) = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| text.trim().parse().ok())
        {
            return Some(pid);
        }
        thread::sleep(Duration::from_millis(20));
    }
    None
}

fn wait_for_exit(child: &mut std::process::Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(20));
    }
    None
}

/// Running and not a zombie.
fn alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .is_some_and(|state| state != 'Z'),
        Err(_) => false,
    }
}

fn wait_until_gone(pid: i32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !alive(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[cfg(target_os = "linux")]
#[test]
fn test_sigterm_stops_agent_and_exits_143() {
    skip_without_tool!("sh");
    skip_without_tool!("sleep");

    let t = Test::with_config("[repository.home]\nenv.borg_repo = /srv/borg/home\n");
    let state = t.dir.path();
    t.fake_tool("ssh-agent", &agent_script(state));
    t.fake_tool("borg", &borg_script(state));

    let mut child = t.process().args(["list", "home"]).spawn().unwrap();

    let Some(borg_pid) = wait_for_pid(&state.join("borg.pid"), Duration::from_secs(10)) else {
        let _ = child.kill();
        let output = child.wait_with_output().unwrap();
        panic!("borg never started: {}", String::from_utf8_lossy(&output.stderr));
    };
    let agent_pid = wait_for_pid(&state.join("agent.pid"), Duration::from_secs(1))
        .expect("agent pid recorded");
    assert!(alive(agent_pid));

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let status = wait_for_exit(&mut child, Duration::from_secs(10));
    let agent_gone = wait_until_gone(agent_pid, Duration::from_secs(5));

    let _ = kill(Pid::from_raw(borg_pid), Signal::SIGKILL);
    if !agent_gone {
        let _ = kill(Pid::from_raw(agent_pid), Signal::SIGKILL);
    }

    let status = status.unwrap_or_else(|| {
        let _ = child.kill();
        panic!("syborg did not exit after SIGTERM");
    });
    assert_eq!(status.code(), Some(143));
    assert!(agent_gone, "agent {} survived SIGTERM", agent_pid);
}
