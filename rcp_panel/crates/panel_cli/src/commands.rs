use anyhow::{anyhow, bail, Context};
use panel_core::ParamId;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect { host: Option<String>, port: Option<u16> },
    Disconnect,
    Toggle,
    /// Type into a field without submitting.
    Edit { id: ParamId, text: String },
    Submit { id: ParamId },
    /// Type and submit in one go.
    Set { id: ParamId, text: String },
    Bang { id: ParamId },
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  connect [host] [port]   open a session (defaults from config)
  disconnect              close the session
  toggle                  press the connect/disconnect button
  edit <id> <text>        type into a value field
  submit <id>             submit what was typed
  set <id> <text>         edit and submit
  bang <id>               fire a trigger
  show                    print the panel
  help                    this text
  quit                    leave";

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim_start()),
        None => (line, ""),
    };

    let cmd = match word {
        "connect" | "c" => {
            let mut parts = rest.split_whitespace();
            let host = parts.next().map(str::to_string);
            let port = parts
                .next()
                .map(|p| p.parse::<u16>().with_context(|| format!("bad port {p:?}")))
                .transpose()?;
            if parts.next().is_some() {
                bail!("usage: connect [host] [port]");
            }
            Command::Connect { host, port }
        }
        "disconnect" | "d" => Command::Disconnect,
        "toggle" | "t" => Command::Toggle,
        "edit" => {
            let (id, text) = id_and_text(rest)?;
            Command::Edit { id, text }
        }
        "set" | "s" => {
            let (id, text) = id_and_text(rest)?;
            Command::Set { id, text }
        }
        "submit" => Command::Submit { id: parse_id(rest)? },
        "bang" | "b" => Command::Bang { id: parse_id(rest)? },
        "show" | "ls" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => bail!("unknown command {other:?}, try help"),
    };
    Ok(Some(cmd))
}

fn parse_id(s: &str) -> anyhow::Result<ParamId> {
    let s = s.trim();
    if s.is_empty() {
        bail!("missing parameter id");
    }
    s.parse::<i32>()
        .map(ParamId)
        .map_err(|_| anyhow!("bad parameter id {s:?}"))
}

/// `<id> <text>` where the text keeps its inner spaces and may be empty.
fn id_and_text(rest: &str) -> anyhow::Result<(ParamId, String)> {
    let (id, text) = match rest.split_once(char::is_whitespace) {
        Some((id, text)) => (id, text),
        None => (rest, ""),
    };
    Ok((parse_id(id)?, text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_variants() {
        assert_eq!(
            parse("connect").unwrap(),
            Some(Command::Connect {
                host: None,
                port: None
            })
        );
        assert_eq!(
            parse("  connect 10.0.0.4 9000 ").unwrap(),
            Some(Command::Connect {
                host: Some("10.0.0.4".into()),
                port: Some(9000)
            })
        );
        assert!(parse("connect host notaport").is_err());
        assert!(parse("connect a 1 extra").is_err());
    }

    #[test]
    fn set_keeps_text_verbatim() {
        assert_eq!(
            parse("set 3 saw tooth").unwrap(),
            Some(Command::Set {
                id: ParamId(3),
                text: "saw tooth".into()
            })
        );
        assert_eq!(
            parse("edit 5").unwrap(),
            Some(Command::Edit {
                id: ParamId(5),
                text: String::new()
            })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse("   ").unwrap(), None);
        assert!(parse("bang").is_err());
        assert!(parse("bang x").is_err());
        assert!(parse("fly 1").is_err());
    }
}
