use fnv::FnvHashSet;

use crate::basic_types::Interpretation;
use crate::plugins::PluginRegistry;
use crate::program::AtomPattern;
use crate::program::ExternalAtom;
use crate::program::Module;
use crate::program::ModuleAtom;
use crate::program::Rule;
use crate::program::RuleBodyLiteral;
use crate::program::Term;
use crate::registry::Registry;
use crate::registry::SymbolId;
use crate::registry::AUX_PREFIX;
use crate::registry::INSTANCE_SEPARATOR;
use crate::results::SolveError;

/// Parses program text into modules registered in the [`Registry`].
///
/// The format is line-agnostic and statement-based:
///
/// ```text
/// #module(p1, [q/1]).
/// q(a).
/// r(X) v s(X) :- q(X), not t(X).
/// n(N) :- &count[q](N).
/// out(X) :- @p2[q]::result(X).
/// ```
///
/// Statements before any `#module` directive belong to an implicit main
/// module called `main`. Predicates are qualified with their module name
/// internally, so equal predicate names in different modules stay distinct.
#[derive(Debug)]
pub struct ProgramReader<'a> {
    plugins: &'a PluginRegistry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Variable(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    If,
    Amp,
    At,
    ColonColon,
    Slash,
    Hash,
}

struct ModuleBuilder {
    name: String,
    formal_inputs: Vec<SymbolId>,
    edb: Interpretation,
    idb: Vec<Rule>,
}

impl<'a> ProgramReader<'a> {
    pub fn new(plugins: &'a PluginRegistry) -> ProgramReader<'a> {
        ProgramReader { plugins }
    }

    /// Parses `source` and registers every declared module. Fails without
    /// registering anything on the first error.
    pub fn load(&self, registry: &mut Registry, source: &str) -> Result<(), SolveError> {
        let tokens = tokenize(source)?;
        let mut builders: Vec<ModuleBuilder> = Vec::new();

        let mut position = 0;
        while position < tokens.len() {
            let end = tokens[position..]
                .iter()
                .position(|token| *token == Token::Dot)
                .map(|offset| position + offset)
                .ok_or_else(|| parse_error("statement is not terminated by `.`"))?;
            let statement = &tokens[position..end];
            position = end + 1;

            if statement.is_empty() {
                continue;
            }
            if statement[0] == Token::Hash {
                let (name, formals) = parse_module_directive(statement)?;
                check_user_symbol(&name)?;
                check_module_name(&name)?;
                let formal_inputs = formals
                    .iter()
                    .map(|formal| {
                        check_user_symbol(formal)?;
                        Ok(registry.symbols.intern(&qualify(&name, formal)))
                    })
                    .collect::<Result<Vec<_>, SolveError>>()?;
                if builders.iter().any(|builder| builder.name == name) {
                    return Err(parse_error(format!("module `{name}` declared twice")));
                }
                builders.push(ModuleBuilder {
                    name,
                    formal_inputs,
                    edb: Interpretation::new(),
                    idb: Vec::new(),
                });
                continue;
            }

            if builders.is_empty() {
                builders.push(ModuleBuilder {
                    name: "main".to_owned(),
                    formal_inputs: Vec::new(),
                    edb: Interpretation::new(),
                    idb: Vec::new(),
                });
            }
            let builder = builders.last_mut().expect("ensured above");
            parse_statement(registry, self.plugins, builder, statement)?;
        }

        validate_module_calls(registry, &builders)?;

        for builder in builders {
            let name = registry.symbols.intern(&builder.name);
            let _ = registry.add_module(Module {
                name,
                formal_inputs: builder.formal_inputs,
                edb: builder.edb,
                idb: builder.idb,
            });
        }
        Ok(())
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, SolveError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '%' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    let _ = chars.next();
                }
            }
            c if c.is_whitespace() => {
                let _ = chars.next();
            }
            '(' => push_single(&mut chars, &mut tokens, Token::LParen),
            ')' => push_single(&mut chars, &mut tokens, Token::RParen),
            '[' => push_single(&mut chars, &mut tokens, Token::LBracket),
            ']' => push_single(&mut chars, &mut tokens, Token::RBracket),
            ',' => push_single(&mut chars, &mut tokens, Token::Comma),
            '.' => push_single(&mut chars, &mut tokens, Token::Dot),
            '&' => push_single(&mut chars, &mut tokens, Token::Amp),
            '@' => push_single(&mut chars, &mut tokens, Token::At),
            '/' => push_single(&mut chars, &mut tokens, Token::Slash),
            '#' => push_single(&mut chars, &mut tokens, Token::Hash),
            ':' => {
                let _ = chars.next();
                match chars.next() {
                    Some('-') => tokens.push(Token::If),
                    Some(':') => tokens.push(Token::ColonColon),
                    other => {
                        return Err(parse_error(format!(
                            "expected `:-` or `::`, found `:{}`",
                            other.map(String::from).unwrap_or_default()
                        )))
                    }
                }
            }
            c if c == INSTANCE_SEPARATOR => {
                return Err(parse_error(format!(
                    "the separator `{INSTANCE_SEPARATOR}` is reserved"
                )));
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_digit() {
                        text.push(next);
                        let _ = chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(text));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        text.push(next);
                        let _ = chars.next();
                    } else {
                        break;
                    }
                }
                if text.starts_with(|first: char| first.is_uppercase() || first == '_') {
                    tokens.push(Token::Variable(text));
                } else {
                    tokens.push(Token::Ident(text));
                }
            }
            other => return Err(parse_error(format!("unexpected character `{other}`"))),
        }
    }
    Ok(tokens)
}

fn push_single(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    tokens: &mut Vec<Token>,
    token: Token,
) {
    let _ = chars.next();
    tokens.push(token);
}

/// `#module(name, [p/1, q/2])`
fn parse_module_directive(statement: &[Token]) -> Result<(String, Vec<String>), SolveError> {
    let mut parser = Parser::new(statement);
    parser.expect(&Token::Hash)?;
    let directive = parser.ident()?;
    if directive != "module" {
        return Err(parse_error(format!("unknown directive `#{directive}`")));
    }
    parser.expect(&Token::LParen)?;
    let name = parser.ident()?;
    parser.expect(&Token::Comma)?;
    parser.expect(&Token::LBracket)?;

    let mut formals = Vec::new();
    if parser.peek() != Some(&Token::RBracket) {
        loop {
            let predicate = parser.ident()?;
            parser.expect(&Token::Slash)?;
            let _arity = parser.number()?;
            formals.push(predicate);
            if parser.peek() == Some(&Token::Comma) {
                parser.expect(&Token::Comma)?;
            } else {
                break;
            }
        }
    }
    parser.expect(&Token::RBracket)?;
    parser.expect(&Token::RParen)?;
    parser.expect_end()?;
    Ok((name, formals))
}

fn parse_statement(
    registry: &mut Registry,
    plugins: &PluginRegistry,
    builder: &mut ModuleBuilder,
    statement: &[Token],
) -> Result<(), SolveError> {
    let mut parser = Parser::new(statement);

    let mut head = Vec::new();
    if parser.peek() != Some(&Token::If) {
        loop {
            head.push(parse_atom_pattern(registry, &builder.name, &mut parser)?);
            match parser.peek() {
                Some(Token::Ident(word)) if word == "v" => {
                    let _ = parser.ident()?;
                }
                _ => break,
            }
        }
    }

    let mut body = Vec::new();
    if parser.peek() == Some(&Token::If) {
        parser.expect(&Token::If)?;
        loop {
            body.push(parse_body_literal(registry, plugins, builder, &mut parser)?);
            if parser.peek() == Some(&Token::Comma) {
                parser.expect(&Token::Comma)?;
            } else {
                break;
            }
        }
    }
    parser.expect_end()?;

    // A ground, body-free, single-head statement is a fact.
    if body.is_empty() && head.len() == 1 && head[0].is_ground() {
        let tuple = pattern_tuple(&head[0]);
        let _ = builder.edb.insert(registry.atoms.intern(tuple));
        return Ok(());
    }
    if body.is_empty() && head.iter().any(|pattern| !pattern.is_ground()) {
        return Err(parse_error("facts must be ground"));
    }

    let rule = Rule::new(head, body);
    check_rule_safety(registry, &rule)?;
    builder.idb.push(rule);
    Ok(())
}

fn parse_body_literal(
    registry: &mut Registry,
    plugins: &PluginRegistry,
    builder: &mut ModuleBuilder,
    parser: &mut Parser<'_>,
) -> Result<RuleBodyLiteral, SolveError> {
    let naf = match parser.peek() {
        Some(Token::Ident(word)) if word == "not" => {
            let _ = parser.ident()?;
            true
        }
        _ => false,
    };

    match parser.peek() {
        Some(Token::Amp) => {
            parser.expect(&Token::Amp)?;
            let name = parser.ident()?;
            let name_symbol = registry.symbols.intern(&name);
            let plugin = plugins.get(&name).ok_or_else(|| {
                parse_error(format!("unknown external predicate `&{name}`"))
            })?;
            let kinds = plugin.input_kinds().to_vec();

            parser.expect(&Token::LBracket)?;
            let mut inputs = Vec::new();
            if parser.peek() != Some(&Token::RBracket) {
                loop {
                    let symbol = match parser.next_token()? {
                        Token::Ident(text) => {
                            check_user_symbol(&text)?;
                            if matches!(
                                kinds.get(inputs.len()),
                                Some(crate::plugins::InputKind::Predicate)
                            ) {
                                registry.symbols.intern(&qualify(&builder.name, &text))
                            } else {
                                registry.symbols.intern(&text)
                            }
                        }
                        Token::Number(text) => registry.symbols.intern(&text),
                        other => {
                            return Err(parse_error(format!(
                                "unexpected token {other:?} in external input list"
                            )))
                        }
                    };
                    inputs.push(symbol);
                    if parser.peek() == Some(&Token::Comma) {
                        parser.expect(&Token::Comma)?;
                    } else {
                        break;
                    }
                }
            }
            parser.expect(&Token::RBracket)?;

            let mut output = Vec::new();
            if parser.peek() == Some(&Token::LParen) {
                parser.expect(&Token::LParen)?;
                loop {
                    output.push(parse_term(registry, parser)?);
                    if parser.peek() == Some(&Token::Comma) {
                        parser.expect(&Token::Comma)?;
                    } else {
                        break;
                    }
                }
                parser.expect(&Token::RParen)?;
            }

            let atom = registry.intern_external_atom(ExternalAtom {
                name: name_symbol,
                inputs,
                output,
            });
            Ok(RuleBodyLiteral::External { atom, naf })
        }

        Some(Token::At) => {
            parser.expect(&Token::At)?;
            let callee = parser.ident()?;
            check_user_symbol(&callee)?;
            let callee_symbol = registry.symbols.intern(&callee);

            parser.expect(&Token::LBracket)?;
            let mut inputs = Vec::new();
            if parser.peek() != Some(&Token::RBracket) {
                loop {
                    let predicate = parser.ident()?;
                    check_user_symbol(&predicate)?;
                    inputs.push(registry.symbols.intern(&qualify(&builder.name, &predicate)));
                    if parser.peek() == Some(&Token::Comma) {
                        parser.expect(&Token::Comma)?;
                    } else {
                        break;
                    }
                }
            }
            parser.expect(&Token::RBracket)?;
            parser.expect(&Token::ColonColon)?;

            let output = parse_atom_pattern(registry, &callee, parser)?;
            let atom = registry.intern_module_atom(ModuleAtom {
                module: callee_symbol,
                inputs,
                output,
            });
            Ok(RuleBodyLiteral::Module { atom, naf })
        }

        _ => {
            let atom = parse_atom_pattern(registry, &builder.name, parser)?;
            Ok(RuleBodyLiteral::Ordinary { atom, naf })
        }
    }
}

fn parse_atom_pattern(
    registry: &mut Registry,
    module: &str,
    parser: &mut Parser<'_>,
) -> Result<AtomPattern, SolveError> {
    let predicate = parser.ident()?;
    check_user_symbol(&predicate)?;
    let qualified = registry.symbols.intern(&qualify(module, &predicate));

    let mut args = Vec::new();
    if parser.peek() == Some(&Token::LParen) {
        parser.expect(&Token::LParen)?;
        loop {
            args.push(parse_term(registry, parser)?);
            if parser.peek() == Some(&Token::Comma) {
                parser.expect(&Token::Comma)?;
            } else {
                break;
            }
        }
        parser.expect(&Token::RParen)?;
    }
    Ok(AtomPattern {
        predicate: qualified,
        args,
    })
}

fn parse_term(registry: &mut Registry, parser: &mut Parser<'_>) -> Result<Term, SolveError> {
    match parser.next_token()? {
        Token::Ident(text) => Ok(Term::Constant(registry.symbols.intern(&text))),
        Token::Number(text) => Ok(Term::Constant(registry.symbols.intern(&text))),
        Token::Variable(text) => Ok(Term::Variable(registry.symbols.intern(&text))),
        other => Err(parse_error(format!("expected a term, found {other:?}"))),
    }
}

/// Every variable must occur in a positive ordinary body atom, a positive
/// external output, or a positive module-atom output.
fn check_rule_safety(registry: &Registry, rule: &Rule) -> Result<(), SolveError> {
    let mut bound: FnvHashSet<SymbolId> = FnvHashSet::default();
    for literal in &rule.body {
        match literal {
            RuleBodyLiteral::Ordinary { atom, naf: false } => bound.extend(atom.variables()),
            RuleBodyLiteral::External { atom, naf: false } => {
                let eatom = registry.external_atom(*atom);
                for term in &eatom.output {
                    if let Term::Variable(name) = term {
                        let _ = bound.insert(*name);
                    }
                }
            }
            RuleBodyLiteral::Module { atom, naf: false } => {
                let matom = registry.module_atom(*atom);
                bound.extend(matom.output.variables());
            }
            _ => {}
        }
    }

    let mut check = |variable: SymbolId| -> Result<(), SolveError> {
        if bound.contains(&variable) {
            Ok(())
        } else {
            Err(SolveError::Safety(format!(
                "variable `{}` occurs only in negative or head positions",
                registry.symbols.resolve(variable)
            )))
        }
    };

    for pattern in &rule.head {
        for variable in pattern.variables() {
            check(variable)?;
        }
    }
    for literal in &rule.body {
        match literal {
            RuleBodyLiteral::Ordinary { atom, naf: true } => {
                for variable in atom.variables() {
                    check(variable)?;
                }
            }
            RuleBodyLiteral::External { atom, naf: true } => {
                let eatom = registry.external_atom(*atom);
                for term in &eatom.output {
                    if let Term::Variable(name) = term {
                        check(*name)?;
                    }
                }
            }
            RuleBodyLiteral::Module { atom, naf: true } => {
                let matom = registry.module_atom(*atom);
                for variable in matom.output.variables() {
                    check(variable)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Module atoms must reference declared modules with matching input counts.
fn validate_module_calls(
    registry: &Registry,
    builders: &[ModuleBuilder],
) -> Result<(), SolveError> {
    for builder in builders {
        for rule in &builder.idb {
            for literal in &rule.body {
                let RuleBodyLiteral::Module { atom, .. } = literal else {
                    continue;
                };
                let matom = registry.module_atom(*atom);
                let callee = registry.symbols.resolve(matom.module);
                let Some(declaration) = builders.iter().find(|other| other.name == callee) else {
                    return Err(parse_error(format!(
                        "module atom references undeclared module `{callee}`"
                    )));
                };
                if declaration.formal_inputs.len() != matom.inputs.len() {
                    return Err(parse_error(format!(
                        "module `{callee}` expects {} input(s), got {}",
                        declaration.formal_inputs.len(),
                        matom.inputs.len()
                    )));
                }
            }
        }
    }
    Ok(())
}

fn pattern_tuple(pattern: &AtomPattern) -> Vec<SymbolId> {
    let mut tuple = Vec::with_capacity(pattern.args.len() + 1);
    tuple.push(pattern.predicate);
    for term in &pattern.args {
        match term {
            Term::Constant(symbol) => tuple.push(*symbol),
            Term::Variable(_) => unreachable!("checked by is_ground"),
        }
    }
    tuple
}

fn qualify(module: &str, predicate: &str) -> String {
    format!("{module}{INSTANCE_SEPARATOR}{predicate}")
}

/// Module names shaped like an instance prefix (`m<digits>`) would make
/// prefixed predicates ambiguous.
fn check_module_name(name: &str) -> Result<(), SolveError> {
    if let Some(rest) = name.strip_prefix('m') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(parse_error(format!(
                "module name `{name}` collides with the instance-prefix namespace"
            )));
        }
    }
    Ok(())
}

fn check_user_symbol(name: &str) -> Result<(), SolveError> {
    if name.starts_with(AUX_PREFIX) {
        return Err(parse_error(format!(
            "the prefix `{AUX_PREFIX}` is reserved, found `{name}`"
        )));
    }
    if name.contains(INSTANCE_SEPARATOR) {
        return Err(parse_error(format!(
            "the separator `{INSTANCE_SEPARATOR}` is reserved, found `{name}`"
        )));
    }
    Ok(())
}

fn parse_error(message: impl Into<String>) -> SolveError {
    SolveError::Parse(message.into())
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Parser<'t> {
        Parser {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next_token(&mut self) -> Result<Token, SolveError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| parse_error("unexpected end of statement"))?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SolveError> {
        let token = self.next_token()?;
        if token == *expected {
            Ok(())
        } else {
            Err(parse_error(format!(
                "expected {expected:?}, found {token:?}"
            )))
        }
    }

    fn expect_end(&self) -> Result<(), SolveError> {
        if self.position == self.tokens.len() {
            Ok(())
        } else {
            Err(parse_error(format!(
                "unexpected trailing tokens: {:?}",
                &self.tokens[self.position..]
            )))
        }
    }

    fn ident(&mut self) -> Result<String, SolveError> {
        match self.next_token()? {
            Token::Ident(text) => Ok(text),
            other => Err(parse_error(format!(
                "expected an identifier, found {other:?}"
            ))),
        }
    }

    fn number(&mut self) -> Result<String, SolveError> {
        match self.next_token()? {
            Token::Number(text) => Ok(text),
            other => Err(parse_error(format!("expected a number, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProgramReader;
    use crate::plugins::register_builtin_plugins;
    use crate::plugins::PluginRegistry;
    use crate::registry::Registry;
    use crate::results::SolveError;

    fn load(source: &str) -> Result<Registry, SolveError> {
        let mut plugins = PluginRegistry::new();
        register_builtin_plugins(&mut plugins);
        let mut registry = Registry::new();
        ProgramReader::new(&plugins).load(&mut registry, source)?;
        Ok(registry)
    }

    #[test]
    fn implicit_main_module_with_facts_and_rules() {
        let registry = load("p(a). q(X) :- p(X).").expect("parses");
        let main = registry
            .module_by_name(registry.symbols.lookup("main").unwrap())
            .expect("implicit main module exists");
        let module = registry.module(main);
        assert_eq!(module.edb.count(), 1);
        assert_eq!(module.idb.len(), 1);
    }

    #[test]
    fn module_directive_and_call() {
        let registry = load(
            "#module(p1, []). q(1). \
             #module(main, []). r(X) :- @p1[]::q(X).",
        )
        .expect("parses");
        assert_eq!(registry.main_modules().len(), 2);
    }

    #[test]
    fn reserved_prefix_is_rejected() {
        let result = load("aux_r(a).");
        assert!(matches!(result, Err(SolveError::Parse(_))));
    }

    #[test]
    fn undeclared_module_is_rejected() {
        let result = load("r(X) :- @nowhere[]::q(X).");
        assert!(matches!(result, Err(SolveError::Parse(_))));
    }

    #[test]
    fn unsafe_rule_is_rejected() {
        let result = load("p(X) :- not q(X).");
        assert!(matches!(result, Err(SolveError::Safety(_))));
    }

    #[test]
    fn unknown_external_predicate_is_rejected() {
        let result = load("p(X) :- &nosuch[q](X).");
        assert!(matches!(result, Err(SolveError::Parse(_))));
    }

    #[test]
    fn disjunction_in_the_head() {
        let registry = load("a v b.").expect("parses");
        let main = registry
            .module_by_name(registry.symbols.lookup("main").unwrap())
            .unwrap();
        let module = registry.module(main);
        assert_eq!(module.idb.len(), 1);
        assert_eq!(module.idb[0].head.len(), 2);
    }
}
