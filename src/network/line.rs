//! Just enough IRC line parsing for the bot session.
//!
//! Message tags are skipped, the prefix is kept verbatim, and the trailing
//! parameter (after ` :`) becomes the last entry of `params`.

/// A parsed protocol line borrowing from its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl<'a> Line<'a> {
    pub fn param(&self, index: usize) -> Option<&'a str> {
        self.params.get(index).copied()
    }
}

/// Parse one line. Returns `None` for blank or command-less input.
pub fn parse(raw: &str) -> Option<Line<'_>> {
    let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start_matches(' ');

    if rest.starts_with('@') {
        rest = rest.split_once(' ')?.1.trim_start_matches(' ');
    }

    let mut prefix = None;
    if let Some(stripped) = rest.strip_prefix(':') {
        let (source, tail) = stripped.split_once(' ')?;
        prefix = Some(source);
        rest = tail.trim_start_matches(' ');
    }

    let (command, mut rest) = match rest.split_once(' ') {
        Some((command, tail)) => (command, tail),
        None => (rest, ""),
    };
    if command.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        match rest.split_once(' ') {
            Some((param, tail)) => {
                params.push(param);
                rest = tail;
            }
            None => {
                params.push(rest);
                break;
            }
        }
    }

    Some(Line {
        prefix,
        command,
        params,
    })
}
