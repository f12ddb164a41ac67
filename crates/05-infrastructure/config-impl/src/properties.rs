//! Properties 格式配置源
//!
//! 每行一条属性，`#` 与 `!` 开头的行是注释，行尾的 `\` 把下一行接到
//! 当前行后面。键在第一个未转义的 `=`、`:` 或空白处结束，空白之后还可以
//! 再跟一个 `=` 或 `:`。键和值里支持 `\=`、`\:`、`\ `、`\t`、`\n`、
//! `\r`、`\f` 与 `\uXXXX` 转义。键统一转为小写。

use config::{Map, Source, Value};
use std::iter::Peekable;
use std::str::Chars;

/// Properties 文本配置源
#[derive(Debug, Clone)]
pub struct PropertiesSource {
    origin: String,
    entries: Vec<(String, String)>,
}

impl PropertiesSource {
    /// 解析 properties 文本
    pub fn parse(origin: impl Into<String>, text: &str) -> Self {
        Self {
            origin: origin.into(),
            entries: parse_entries(text),
        }
    }

    /// 来源名称
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// 解析出的键值对，按出现顺序排列，重复键以最后一次为准
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl Source for PropertiesSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), Value::new(Some(&self.origin), value.clone()));
        }
        Ok(map)
    }
}

fn parse_entries(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = if pending.is_empty() {
            raw.trim()
        } else {
            raw.trim_start()
        };
        let comment = line.is_empty() || line.starts_with('#') || line.starts_with('!');
        if pending.is_empty() && comment {
            continue;
        }

        if let Some(body) = continued(line) {
            pending.push_str(body);
            continue;
        }
        pending.push_str(line);

        if let Some(entry) = split_entry(&pending) {
            entries.push(entry);
        }
        pending.clear();
    }

    if !pending.is_empty() {
        if let Some(entry) = split_entry(&pending) {
            entries.push(entry);
        }
    }
    entries
}

// 以奇数个反斜杠结尾的行延续到下一行
fn continued(line: &str) -> Option<&str> {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    (trailing % 2 == 1).then(|| &line[..line.len() - 1])
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let mut chars = line.chars().peekable();
    let mut key = String::new();
    let mut separated = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => key.extend(unescape(&mut chars)),
            '=' | ':' => {
                separated = true;
                break;
            }
            c if c.is_whitespace() => break,
            c => key.push(c),
        }
    }
    if key.is_empty() {
        return None;
    }

    skip_whitespace(&mut chars);
    if !separated && matches!(chars.peek(), Some('=' | ':')) {
        chars.next();
        skip_whitespace(&mut chars);
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(unescape(&mut chars)),
            c => value.push(c),
        }
    }
    Some((key.to_lowercase(), value))
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn unescape(chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    match chars.next()? {
        't' => Some('\t'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        'f' => Some('\u{c}'),
        'u' => {
            let hex: String = chars.by_ref().take(4).collect();
            u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
        }
        other => Some(other),
    }
}
