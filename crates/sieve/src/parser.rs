/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Recursive descent parser over the token stream (§4.5). Depth-tracked
//! recursion through `parse_test` enforces `max_condition_depth`; every
//! string-list literal is checked against `max_array_elements` as it is
//! built.

use crate::{
    ast::{Action, AddressPart, MatchType, Script, Stmt, Test, VacationArgs},
    token::Token,
    SieveError, SieveLimits,
};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    limits: SieveLimits,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, limits: SieveLimits) -> Self {
        Parser {
            tokens,
            pos: 0,
            limits,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(), SieveError> {
        match self.bump() {
            Token::Identifier(s) if s.eq_ignore_ascii_case(expected) => Ok(()),
            other => Err(SieveError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), SieveError> {
        let got = self.bump();
        if got == expected {
            Ok(())
        } else {
            Err(SieveError::UnexpectedToken(format!("{got:?}")))
        }
    }

    fn expect_string(&mut self) -> Result<String, SieveError> {
        match self.bump() {
            Token::String(s) => Ok(s),
            other => Err(SieveError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn peek_is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Identifier(s) if s.eq_ignore_ascii_case(name))
    }

    /// A single string or a bracketed `[ "a", "b", ... ]` list.
    fn parse_string_list(&mut self) -> Result<Vec<String>, SieveError> {
        if *self.peek() == Token::LBracket {
            self.bump();
            let mut out = Vec::new();
            if *self.peek() != Token::RBracket {
                loop {
                    out.push(self.expect_string()?);
                    if out.len() > self.limits.max_array_elements {
                        return Err(SieveError::TooManyArrayElements);
                    }
                    if *self.peek() == Token::Comma {
                        self.bump();
                        continue;
                    }
                    break;
                }
            }
            self.expect(Token::RBracket)?;
            Ok(out)
        } else {
            Ok(vec![self.expect_string()?])
        }
    }

    pub fn parse_script(&mut self) -> Result<Script, SieveError> {
        let mut script = Script::default();
        while *self.peek() != Token::Eof {
            if self.peek_is_ident("require") {
                self.bump();
                script.requires.extend(self.parse_string_list()?);
                self.expect(Token::Semicolon)?;
                continue;
            }
            script.body.push(self.parse_stmt(0)?);
        }
        Ok(script)
    }

    fn parse_block(&mut self, depth: usize) -> Result<Vec<Stmt>, SieveError> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != Token::RBrace {
            if *self.peek() == Token::Eof {
                return Err(SieveError::UnexpectedEof);
            }
            stmts.push(self.parse_stmt(depth)?);
        }
        self.expect(Token::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self, depth: usize) -> Result<Stmt, SieveError> {
        if self.peek_is_ident("if") {
            return self.parse_if(depth);
        }
        let action = self.parse_action()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Do(action))
    }

    fn parse_if(&mut self, depth: usize) -> Result<Stmt, SieveError> {
        if depth >= self.limits.max_condition_depth {
            return Err(SieveError::ConditionTooDeep);
        }
        self.expect_ident("if")?;
        let mut branches = Vec::new();
        let test = self.parse_test(depth + 1)?;
        let block = self.parse_block(depth + 1)?;
        branches.push((test, block));

        loop {
            if self.peek_is_ident("elsif") {
                self.bump();
                let test = self.parse_test(depth + 1)?;
                let block = self.parse_block(depth + 1)?;
                branches.push((test, block));
                continue;
            }
            break;
        }

        let otherwise = if self.peek_is_ident("else") {
            self.bump();
            Some(self.parse_block(depth + 1)?)
        } else {
            None
        };

        Ok(Stmt::If { branches, otherwise })
    }

    fn parse_test(&mut self, depth: usize) -> Result<Test, SieveError> {
        if depth >= self.limits.max_condition_depth {
            return Err(SieveError::ConditionTooDeep);
        }
        match self.bump() {
            Token::Identifier(name) if name.eq_ignore_ascii_case("true") => Ok(Test::True),
            Token::Identifier(name) if name.eq_ignore_ascii_case("false") => Ok(Test::False),
            Token::Identifier(name) if name.eq_ignore_ascii_case("not") => {
                Ok(Test::Not(Box::new(self.parse_test(depth + 1)?)))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("allof") => {
                Ok(Test::AllOf(self.parse_test_list(depth + 1)?))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("anyof") => {
                Ok(Test::AnyOf(self.parse_test_list(depth + 1)?))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("exists") => {
                let headers = self.parse_string_list()?;
                Ok(Test::Exists { headers })
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("size") => {
                let over = match self.bump() {
                    Token::Tag(t) if t.eq_ignore_ascii_case("over") => true,
                    Token::Tag(t) if t.eq_ignore_ascii_case("under") => false,
                    other => return Err(SieveError::UnexpectedToken(format!("{other:?}"))),
                };
                let limit = match self.bump() {
                    Token::Number(n) => n,
                    other => return Err(SieveError::UnexpectedToken(format!("{other:?}"))),
                };
                Ok(Test::Size { over, limit })
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("address") => {
                let mut part = AddressPart::All;
                let mut match_type = MatchType::Is;
                loop {
                    match self.peek().clone() {
                        Token::Tag(t) if t.eq_ignore_ascii_case("localpart") => {
                            self.bump();
                            part = AddressPart::LocalPart;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("domain") => {
                            self.bump();
                            part = AddressPart::Domain;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("all") => {
                            self.bump();
                            part = AddressPart::All;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("is") => {
                            self.bump();
                            match_type = MatchType::Is;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("contains") => {
                            self.bump();
                            match_type = MatchType::Contains;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("matches") => {
                            self.bump();
                            match_type = MatchType::Matches;
                        }
                        _ => break,
                    }
                }
                let header = self.expect_string()?;
                let keys = self.parse_string_list()?;
                Ok(Test::Address {
                    part,
                    header,
                    match_type,
                    keys,
                })
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("header") => {
                let mut match_type = MatchType::Is;
                loop {
                    match self.peek().clone() {
                        Token::Tag(t) if t.eq_ignore_ascii_case("is") => {
                            self.bump();
                            match_type = MatchType::Is;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("contains") => {
                            self.bump();
                            match_type = MatchType::Contains;
                        }
                        Token::Tag(t) if t.eq_ignore_ascii_case("matches") => {
                            self.bump();
                            match_type = MatchType::Matches;
                        }
                        _ => break,
                    }
                }
                let names = self.parse_string_list()?;
                let keys = self.parse_string_list()?;
                Ok(Test::Header {
                    names,
                    match_type,
                    keys,
                })
            }
            other => Err(SieveError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn parse_test_list(&mut self, depth: usize) -> Result<Vec<Test>, SieveError> {
        self.expect(Token::LParen)?;
        let mut out = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                out.push(self.parse_test(depth)?);
                if out.len() > self.limits.max_array_elements {
                    return Err(SieveError::TooManyArrayElements);
                }
                if *self.peek() == Token::Comma {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(out)
    }

    fn parse_action(&mut self) -> Result<Action, SieveError> {
        match self.bump() {
            Token::Identifier(name) if name.eq_ignore_ascii_case("keep") => Ok(Action::Keep),
            Token::Identifier(name) if name.eq_ignore_ascii_case("discard") => Ok(Action::Discard),
            Token::Identifier(name) if name.eq_ignore_ascii_case("stop") => Ok(Action::Stop),
            Token::Identifier(name) if name.eq_ignore_ascii_case("fileinto") => {
                Ok(Action::FileInto(self.expect_string()?))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("redirect") => {
                Ok(Action::Redirect(self.expect_string()?))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("reject") => {
                Ok(Action::Reject(self.expect_string()?))
            }
            Token::Identifier(name) if name.eq_ignore_ascii_case("vacation") => {
                self.parse_vacation()
            }
            other => Err(SieveError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn parse_vacation(&mut self) -> Result<Action, SieveError> {
        let mut args = VacationArgs {
            days: 7,
            ..Default::default()
        };
        loop {
            match self.peek().clone() {
                Token::Tag(t) if t.eq_ignore_ascii_case("days") => {
                    self.bump();
                    let days = match self.bump() {
                        Token::Number(n) => n,
                        other => return Err(SieveError::UnexpectedToken(format!("{other:?}"))),
                    };
                    if days > self.limits.max_vacation_days as u64 {
                        return Err(SieveError::VacationDaysTooLarge);
                    }
                    args.days = days as u32;
                }
                Token::Tag(t) if t.eq_ignore_ascii_case("subject") => {
                    self.bump();
                    args.subject = Some(self.expect_string()?);
                }
                Token::Tag(t) if t.eq_ignore_ascii_case("from") => {
                    self.bump();
                    args.from = Some(self.expect_string()?);
                }
                Token::Tag(t) if t.eq_ignore_ascii_case("addresses") => {
                    self.bump();
                    args.addresses = self.parse_string_list()?;
                }
                _ => break,
            }
        }
        args.reason = self.expect_string()?;
        Ok(Action::Vacation(args))
    }
}
