//! 计算器工具：受限的算术表达式求值（递归下降，不执行任意代码）
//!
//! 支持 `+ - * / % **`、括号、一元负号、常量 pi / e，
//! 函数 sqrt sin cos tan log log10 exp abs floor ceil round min max pow。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::TurnContext;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolError};

#[derive(Deserialize, JsonSchema)]
struct CalculateArgs {
    /// A mathematical expression to evaluate (e.g. '2 + 2', '100 * 0.15', 'sqrt(16)')
    expression: String,
}

/// 嵌套层数上限（括号、函数调用、一元运算符、幂）
const MAX_DEPTH: usize = 64;
/// 表达式长度上限（字符）
const MAX_EXPRESSION_CHARS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // 科学计数法：1e3、2.5E-2
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Num(n));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op("**"));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                }));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// 每层递归都经过这里；超过上限直接报错，不让模型给出的表达式耗尽线程栈
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat_op("+") {
                value += self.term()?;
            } else if self.eat_op("-") {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    /// term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            if self.eat_op("*") {
                value *= self.unary()?;
            } else if self.eat_op("/") {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= rhs;
            } else if self.eat_op("%") {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("modulo by zero".to_string());
                }
                // 结果与除数同号
                value = value - rhs * (value / rhs).floor();
            } else {
                return Ok(value);
            }
        }
    }

    /// unary := ('-' | '+') unary | power；一元负号优先级低于 **
    fn unary(&mut self) -> Result<f64, String> {
        self.nested(|p| {
            if p.eat_op("-") {
                return Ok(-p.unary()?);
            }
            if p.eat_op("+") {
                return p.unary();
            }
            p.power()
        })
    }

    /// power := atom ('**' unary)?，右结合
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.eat_op("**") {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => self.nested(|p| {
                let value = p.expr()?;
                match p.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("expected ')'".to_string()),
                }
            }),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.nested(Self::arguments)?;
                    call(&name, &args)
                } else {
                    match name.as_str() {
                        "pi" => Ok(std::f64::consts::PI),
                        "e" => Ok(std::f64::consts::E),
                        _ => Err(format!("unknown name '{name}'")),
                    }
                }
            }
            Some(t) => Err(format!("unexpected token {t:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, String> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("expected ',' or ')' in argument list".to_string()),
            }
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, String> {
    let one = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(format!("{name}() takes exactly one argument")),
    };
    match name {
        "sqrt" => match args {
            [x] if *x < 0.0 => Err("math domain error".to_string()),
            _ => one(f64::sqrt),
        },
        "sin" => one(f64::sin),
        "cos" => one(f64::cos),
        "tan" => one(f64::tan),
        "exp" => one(f64::exp),
        "abs" => one(f64::abs),
        "floor" => one(f64::floor),
        "ceil" => one(f64::ceil),
        "log10" => match args {
            [x] if *x <= 0.0 => Err("math domain error".to_string()),
            _ => one(f64::log10),
        },
        "log" => match args {
            [x] | [x, _] if *x <= 0.0 => Err("math domain error".to_string()),
            [x] => Ok(x.ln()),
            [x, base] => Ok(x.log(*base)),
            _ => Err("log() takes one or two arguments".to_string()),
        },
        "round" => match args {
            [x] => Ok(round_half_even(*x)),
            [x, digits] => {
                let factor = 10f64.powi(*digits as i32);
                Ok(round_half_even(x * factor) / factor)
            }
            _ => Err("round() takes one or two arguments".to_string()),
        },
        "pow" => match args {
            [x, y] => Ok(x.powf(*y)),
            _ => Err("pow() takes exactly two arguments".to_string()),
        },
        "min" | "max" => {
            if args.len() < 2 {
                return Err(format!("{name}() expects at least two arguments"));
            }
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args.iter().copied().fold(args[0], pick))
        }
        _ => Err(format!("unknown function '{name}'")),
    }
}

/// 银行家舍入（与常见计算器的 round 一致：2.5 -> 2，3.5 -> 4）
fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// 求值表达式
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let chars = expression.chars().count();
    if chars > MAX_EXPRESSION_CHARS {
        return Err(format!(
            "expression too long ({chars} chars, limit {MAX_EXPRESSION_CHARS})"
        ));
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!("unexpected token {:?}", parser.tokens[parser.pos]));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

/// 整数结果不带小数点
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Use this tool when the user asks to calculate, compute, or do math operations. Supports basic arithmetic (+, -, *, /, %, **) and common functions (sqrt, sin, cos, abs, round, etc.)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CalculateArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &TurnContext) -> Result<String, ToolError> {
        let args: CalculateArgs = parse_args(args)?;
        evaluate(&args.expression).map(format_number).map_err(|e| {
            let preview: String = args.expression.chars().take(80).collect();
            ToolError::Failed(format!("Error calculating '{preview}': {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(s: &str) -> f64 {
        evaluate(s).unwrap()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("2 ** 3 ** 2"), 512.0);
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("2 ** -1"), 0.5);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("-7 % 3"), 2.0);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(eval("sqrt(16)"), 4.0);
        assert_eq!(eval("max(1, 7, 3)"), 7.0);
        assert_eq!(eval("pow(2, 10)"), 1024.0);
        assert_eq!(eval("round(2.5)"), 2.0);
        assert_eq!(eval("round(3.14159, 2)"), 3.14);
        assert!((eval("cos(pi)") + 1.0).abs() < 1e-12);
        assert!((eval("log(e)") - 1.0).abs() < 1e-12);
        assert_eq!(eval("1e3 / 4"), 250.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("import os").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(evaluate(&parens).unwrap_err(), "expression nested too deeply");
        let negations = format!("{}1", "-".repeat(500));
        assert_eq!(evaluate(&negations).unwrap_err(), "expression nested too deeply");
        let calls = format!("{}1{}", "abs(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&calls).unwrap_err(), "expression nested too deeply");
        let powers = vec!["2"; 200].join(" ** ");
        assert_eq!(evaluate(&powers).unwrap_err(), "expression nested too deeply");
        // 正常深度不受影响
        assert_eq!(eval(&format!("{}1{}", "(".repeat(10), ")".repeat(10))), 1.0);
        assert_eq!(eval("--1"), 1.0);
    }

    #[test]
    fn test_oversized_expression_is_rejected() {
        let huge = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(evaluate(&huge).unwrap_err().starts_with("expression too long"));
        let huge = format!("{}1", "-".repeat(500_000));
        assert!(evaluate(&huge).unwrap_err().starts_with("expression too long"));
    }

    #[tokio::test]
    async fn test_tool_formats_integers_and_reports_errors() {
        let ctx = TurnContext::new("c", crate::core::Principal::new("u"), "q");
        let out = CalculatorTool
            .execute(serde_json::json!({"expression": "100 * 0.25"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "25");
        let out = CalculatorTool
            .execute(serde_json::json!({"expression": "10 / 4"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "2.5");
        let err = CalculatorTool
            .execute(serde_json::json!({"expression": "1/0"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));

        // 过深的嵌套变成工具错误，而不是让线程栈溢出
        let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let err = CalculatorTool
            .execute(serde_json::json!({"expression": deep}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(ref m) if m.contains("too long")));
    }
}
