/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Discriminated AST for the supported subset of RFC 5228 (§4.5). No
//! `Condition`/`Action` trait objects — a tagged sum type is simpler to
//! evaluate than dynamic dispatch for a fixed, closed set of node kinds.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPart {
    All,
    LocalPart,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchType {
    Is,
    Contains,
    Matches,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Test {
    Address {
        part: AddressPart,
        header: String,
        match_type: MatchType,
        keys: Vec<String>,
    },
    Header {
        names: Vec<String>,
        match_type: MatchType,
        keys: Vec<String>,
    },
    Size {
        over: bool,
        limit: u64,
    },
    Exists {
        headers: Vec<String>,
    },
    True,
    False,
    AllOf(Vec<Test>),
    AnyOf(Vec<Test>),
    Not(Box<Test>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VacationArgs {
    pub reason: String,
    pub days: u32,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Keep,
    FileInto(String),
    Redirect(String),
    Discard,
    Reject(String),
    Vacation(VacationArgs),
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    If {
        branches: Vec<(Test, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    Do(Action),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub requires: Vec<String>,
    pub body: Vec<Stmt>,
}
