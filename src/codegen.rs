//! Code generation: lower the AST into GAS-syntax AT&T x86-64 assembly.
//!
//! Expressions evaluate into `%rax`. Binary operands use a push/pop
//! protocol: the left value is pushed while the right is computed, then the
//! left is popped back so `%rax` holds the left operand and `%rbx` the right
//! one — the order the non-commutative `sub`/`idiv` need. Locals live in
//! 8-byte slots below `%rbp`; collection literals park intermediate pointers
//! in `%r12`-`%r14` and call into the runtime library.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expression, FnBody, Param, Program, Statement, Type, TypeKind, UnaryOp};
use crate::target::Target;

#[derive(Debug, Clone, Copy)]
struct VariableInfo {
    stack_offset: i64,
    is_parameter: bool,
}

pub struct CodeGenerator {
    target: Target,
    output: String,
    label_counter: usize,
    current_function: String,
    variables: HashMap<String, VariableInfo>,
    stack_offset: i64,
    /// Deduplicated string literals, emitted into the data section.
    string_labels: HashMap<String, String>,
    string_pool: Vec<(String, String)>,
    /// Declared return types, used to pick a print path at call sites.
    function_returns: HashMap<String, Type>,
    /// (continue target, break target) for the enclosing loops.
    loop_labels: Vec<(String, String)>,
}

impl CodeGenerator {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            output: String::new(),
            label_counter: 0,
            current_function: String::new(),
            variables: HashMap::new(),
            stack_offset: 0,
            string_labels: HashMap::new(),
            string_pool: Vec::new(),
            function_returns: HashMap::new(),
            loop_labels: Vec::new(),
        }
    }

    pub fn generate(&mut self, program: &Program) -> String {
        self.output.clear();
        self.label_counter = 0;
        self.string_labels.clear();
        self.string_pool.clear();
        self.function_returns.clear();
        self.loop_labels.clear();

        for statement in &program.statements {
            self.collect_strings_in_statement(statement);
            if let Statement::FnDecl {
                name, return_type, ..
            } = statement
            {
                self.function_returns
                    .insert(name.clone(), return_type.clone());
            }
        }

        self.emit_data_section();

        self.push_raw(&format!("{}\n", self.target.text_section));
        let entry = self.target.symbol(self.target.entry_symbol);
        self.push_raw(&format!(".global {entry}\n\n"));

        self.emit_entry(program, &entry);

        for statement in &program.statements {
            if let Statement::FnDecl {
                name,
                params,
                body,
                ..
            } = statement
            {
                self.emit_function(name, params, body);
            }
        }

        self.emit_support_functions();

        std::mem::take(&mut self.output)
    }

    fn emit_data_section(&mut self) {
        self.push_raw(&format!("{}\n", self.target.data_section));
        self.push_raw("format_int: .string \"%d\\n\"\n");
        self.push_raw("format_str: .string \"%s\\n\"\n");
        self.push_raw("format_float: .string \"%.2f\\n\"\n");
        for (label, value) in std::mem::take(&mut self.string_pool) {
            self.push_raw(&format!("{label}: .string \"{}\"\n", escape_asm(&value)));
        }
        self.push_raw("\n");
    }

    fn emit_entry(&mut self, program: &Program, entry: &str) {
        self.variables.clear();
        self.stack_offset = 0;
        self.current_function.clear();

        let top_level: Vec<&Statement> = program
            .statements
            .iter()
            .filter(|statement| !matches!(statement, Statement::FnDecl { .. }))
            .collect();

        let mut slots = 0;
        for statement in &top_level {
            slots += count_slots(statement);
        }
        let frame = self.target.align_stack(slots * 8) + self.target.shadow_space;

        self.push_raw(&format!("{entry}:\n"));
        self.emit("push %rbp");
        self.emit("mov %rsp, %rbp");
        if frame > 0 {
            self.emit(&format!("sub ${frame}, %rsp"));
        }

        for statement in top_level {
            self.emit_statement(statement);
        }

        let has_main = program.statements.iter().any(
            |statement| matches!(statement, Statement::FnDecl { name, .. } if name == "main"),
        );
        if has_main {
            self.emit(&format!("call {}", self.function_symbol("main")));
        }
        self.emit(&format!("mov $0, {}", self.arg_register(0)));
        self.emit(&format!("call {}", self.target.symbol("exit")));
        self.push_raw("\n");
    }

    fn emit_function(&mut self, name: &str, params: &[Param], body: &FnBody) {
        self.current_function = name.to_string();
        self.variables.clear();
        self.stack_offset = 0;

        let body_slots = match body {
            FnBody::Expression(_) => 0,
            FnBody::Block(statements) => statements.iter().map(count_slots).sum(),
        };
        let slots = params.len() as i64 + body_slots;
        let frame = self.target.align_stack(slots * 8) + self.target.shadow_space;

        self.push_raw(&format!("{}:\n", self.function_symbol(name)));
        self.emit("push %rbp");
        self.emit("mov %rsp, %rbp");
        if frame > 0 {
            self.emit(&format!("sub ${frame}, %rsp"));
        }

        let register_count = self.target.arg_registers.len();
        if params.len() > register_count {
            self.emit_comment(&format!(
                "Warning: only the first {register_count} parameters are supported"
            ));
        }
        for (index, param) in params.iter().take(register_count).enumerate() {
            let offset = self.alloc_slot();
            self.variables.insert(
                param.name.clone(),
                VariableInfo {
                    stack_offset: offset,
                    is_parameter: true,
                },
            );
            self.emit(&format!(
                "mov {}, -{offset}(%rbp)",
                self.arg_register(index)
            ));
        }

        match body {
            FnBody::Expression(expression) => self.emit_expression(expression),
            FnBody::Block(statements) => {
                for statement in statements {
                    self.emit_statement(statement);
                }
            }
        }

        self.emit_function_tail();
        self.push_raw("\n");
        self.current_function.clear();
    }

    /// `main` exits the process with its value; everything else returns.
    fn emit_function_tail(&mut self) {
        if self.current_function == "main" {
            self.emit(&format!("mov %rax, {}", self.arg_register(0)));
            self.emit(&format!("call {}", self.target.symbol("exit")));
        } else {
            self.emit("mov %rbp, %rsp");
            self.emit("pop %rbp");
            self.emit("ret");
        }
    }

    fn emit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VarDecl { name, init, .. } => {
                let offset = self.variable_slot(name);
                if let Some(init) = init {
                    self.emit_expression(init);
                    self.emit(&format!("mov %rax, -{offset}(%rbp)"));
                }
            }
            Statement::TupleAssign { targets, values } => self.emit_tuple_assign(targets, values),
            Statement::Expr(expression) => self.emit_expression(expression),
            Statement::Block(statements) => {
                for statement in statements {
                    self.emit_statement(statement);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let else_label = self.fresh_label("else");
                let end_label = self.fresh_label("end_if");
                self.emit_expression(condition);
                self.emit("test %rax, %rax");
                self.emit(&format!("jz {else_label}"));
                self.emit_statement(then_branch);
                self.emit(&format!("jmp {end_label}"));
                self.push_raw(&format!("{else_label}:\n"));
                if let Some(else_branch) = else_branch {
                    self.emit_statement(else_branch);
                }
                self.push_raw(&format!("{end_label}:\n"));
            }
            Statement::While { condition, body } => {
                let loop_label = self.fresh_label("loop");
                let end_label = self.fresh_label("end_loop");
                self.push_raw(&format!("{loop_label}:\n"));
                self.emit_expression(condition);
                self.emit("test %rax, %rax");
                self.emit(&format!("jz {end_label}"));
                self.loop_labels
                    .push((loop_label.clone(), end_label.clone()));
                self.emit_statement(body);
                self.loop_labels.pop();
                self.emit(&format!("jmp {loop_label}"));
                self.push_raw(&format!("{end_label}:\n"));
            }
            Statement::ForIn {
                variable,
                iterable,
                body,
            } => self.emit_for_in(variable, iterable, body),
            Statement::Return(value) => {
                match value {
                    Some(value) => self.emit_expression(value),
                    None => self.emit("mov $0, %rax"),
                }
                self.emit_function_tail();
            }
            Statement::Break => match self.loop_labels.last() {
                Some((_, break_label)) => {
                    let label = break_label.clone();
                    self.emit(&format!("jmp {label}"));
                }
                None => self.emit_comment("Warning: break outside of loop"),
            },
            Statement::Continue => match self.loop_labels.last() {
                Some((continue_label, _)) => {
                    let label = continue_label.clone();
                    self.emit(&format!("jmp {label}"));
                }
                None => self.emit_comment("Warning: continue outside of loop"),
            },
            Statement::Pass => {}
            Statement::FnDecl { .. } => {
                // Emitted separately after the entry point.
            }
            Statement::Global(names) => {
                self.emit_comment(&format!("global {}", names.join(", ")));
            }
            Statement::Local(names) => {
                self.emit_comment(&format!("local {}", names.join(", ")));
            }
            Statement::StructDecl { name, .. } => {
                self.emit_comment(&format!("struct declaration: {name}"));
            }
            Statement::EnumDecl { name, .. } => {
                self.emit_comment(&format!("enum declaration: {name}"));
            }
        }
    }

    /// Every right-hand value is materialized on the stack before the first
    /// store, which is what makes `(a, b) = (b, a)` swap correctly.
    fn emit_tuple_assign(&mut self, targets: &[String], values: &[Expression]) {
        for value in values {
            self.emit_expression(value);
            self.emit("push %rax");
        }
        let count = values.len() as i64;
        for (index, target) in targets.iter().enumerate() {
            let from_top = (count - 1 - index as i64) * 8;
            let offset = self.variable_slot(target);
            self.emit(&format!("mov {from_top}(%rsp), %rax"));
            self.emit(&format!("mov %rax, -{offset}(%rbp)"));
        }
        self.emit(&format!("add ${}, %rsp", count * 8));
    }

    fn emit_for_in(&mut self, variable: &str, iterable: &Expression, body: &Statement) {
        let is_range = matches!(iterable, Expression::Call { name, .. } if name == "range");
        let (len_call, get_call) = if is_range {
            ("range_len", "range_get")
        } else {
            ("list_len", "list_get")
        };

        let iter_offset = self.alloc_slot();
        let len_offset = self.alloc_slot();
        let index_offset = self.alloc_slot();
        let var_offset = self.variable_slot(variable);

        self.emit_expression(iterable);
        self.emit(&format!("mov %rax, -{iter_offset}(%rbp)"));
        self.emit(&format!("mov %rax, {}", self.arg_register(0)));
        self.emit(&format!("call {}", self.target.symbol(len_call)));
        self.emit(&format!("mov %rax, -{len_offset}(%rbp)"));
        self.emit(&format!("movq $0, -{index_offset}(%rbp)"));

        let head_label = self.fresh_label("loop");
        let step_label = self.fresh_label("loop_step");
        let end_label = self.fresh_label("end_loop");

        self.push_raw(&format!("{head_label}:\n"));
        self.emit(&format!("mov -{index_offset}(%rbp), %rax"));
        self.emit(&format!("cmp -{len_offset}(%rbp), %rax"));
        self.emit(&format!("jge {end_label}"));

        self.emit(&format!(
            "mov -{iter_offset}(%rbp), {}",
            self.arg_register(0)
        ));
        self.emit(&format!(
            "mov -{index_offset}(%rbp), {}",
            self.arg_register(1)
        ));
        self.emit(&format!("call {}", self.target.symbol(get_call)));
        self.emit(&format!("mov %rax, -{var_offset}(%rbp)"));

        self.loop_labels
            .push((step_label.clone(), end_label.clone()));
        self.emit_statement(body);
        self.loop_labels.pop();

        self.push_raw(&format!("{step_label}:\n"));
        self.emit(&format!("addq $1, -{index_offset}(%rbp)"));
        self.emit(&format!("jmp {head_label}"));
        self.push_raw(&format!("{end_label}:\n"));
    }

    fn emit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Int(value) => self.emit(&format!("mov ${value}, %rax")),
            Expression::Bool(value) => {
                self.emit(&format!("mov ${}, %rax", if *value { 1 } else { 0 }))
            }
            Expression::Float(value) => {
                // Floats are truncated toward zero into the integer lane.
                self.emit_comment(&format!("Float literal: {value}"));
                self.emit(&format!("movq ${}, %rax", *value as i64));
            }
            Expression::Str(value) => {
                let label = self
                    .string_labels
                    .get(value)
                    .cloned()
                    .unwrap_or_else(|| "str_0".to_string());
                self.emit(&format!("leaq {label}(%rip), %rax"));
            }
            Expression::Identifier(name) => match self.variables.get(name) {
                Some(info) => {
                    let suffix = if info.is_parameter { " (parameter)" } else { "" };
                    let offset = info.stack_offset;
                    self.emit(&format!("mov -{offset}(%rbp), %rax # {name}{suffix}"));
                }
                None => {
                    self.emit_comment(&format!(
                        "Warning: unknown variable {name}, using default location"
                    ));
                    self.emit("mov -8(%rbp), %rax");
                }
            },
            Expression::Binary { op, left, right } => self.emit_binary(*op, left, right),
            Expression::Unary { op, operand } => {
                self.emit_expression(operand);
                match op {
                    UnaryOp::Neg => self.emit("neg %rax"),
                    UnaryOp::Not => {
                        self.emit("test %rax, %rax");
                        self.emit("setz %al");
                        self.emit("movzx %al, %rax");
                    }
                    UnaryOp::Plus => {}
                }
            }
            Expression::Call { name, args } => self.emit_call(name, args),
            Expression::Index { object, index } => {
                self.emit_expression(object);
                self.emit("push %rax");
                self.emit_expression(index);
                self.emit(&format!("mov %rax, {}", self.arg_register(1)));
                self.emit(&format!("pop {}", self.arg_register(0)));
                self.emit(&format!("call {}", self.target.symbol("collection_get")));
            }
            Expression::Tuple(elements) => {
                // Bare tuples only appear in grouping positions; outside of
                // tuple assignment the first element is the value.
                self.emit_comment("Tuple expression");
                match elements.first() {
                    Some(first) => self.emit_expression(first),
                    None => self.emit("mov $0, %rax"),
                }
            }
            Expression::List(elements) => self.emit_list_literal(elements),
            Expression::Dict(pairs) => self.emit_dict_literal(pairs),
        }
    }

    fn emit_binary(&mut self, op: BinaryOp, left: &Expression, right: &Expression) {
        // and/or must short-circuit, so they branch before the right operand.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.emit_short_circuit(op, left, right);
        }

        self.emit_expression(left);
        self.emit("push %rax");
        self.emit_expression(right);
        self.emit("mov %rax, %rbx");
        self.emit("pop %rax");

        match op {
            BinaryOp::Add => self.emit("add %rbx, %rax"),
            BinaryOp::Sub => self.emit("sub %rbx, %rax"),
            BinaryOp::Mul => self.emit("imul %rbx, %rax"),
            BinaryOp::Div | BinaryOp::FloorDiv => {
                self.emit("xor %rdx, %rdx");
                self.emit("idiv %rbx");
            }
            BinaryOp::Mod => {
                self.emit("xor %rdx, %rdx");
                self.emit("idiv %rbx");
                self.emit("mov %rdx, %rax");
            }
            BinaryOp::Power => self.emit_power(),
            BinaryOp::Eq => self.emit_comparison("sete"),
            BinaryOp::Ne => self.emit_comparison("setne"),
            BinaryOp::Lt => self.emit_comparison("setl"),
            BinaryOp::Le => self.emit_comparison("setle"),
            BinaryOp::Gt => self.emit_comparison("setg"),
            BinaryOp::Ge => self.emit_comparison("setge"),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn emit_comparison(&mut self, set_instruction: &str) {
        self.emit("cmp %rbx, %rax");
        self.emit(&format!("{set_instruction} %al"));
        self.emit("movzx %al, %rax");
    }

    /// Inline `%rax ** %rbx` loop; the zero exponent skips straight to 1.
    fn emit_power(&mut self) {
        let loop_label = self.fresh_label("power_loop");
        let done_label = self.fresh_label("power_done");
        self.emit("push %rcx");
        self.emit("push %rdx");
        self.emit("mov %rax, %rdx");
        self.emit("mov %rbx, %rcx");
        self.emit("mov $1, %rax");
        self.emit("test %rcx, %rcx");
        self.emit(&format!("jz {done_label}"));
        self.push_raw(&format!("{loop_label}:\n"));
        self.emit("imul %rdx, %rax");
        self.emit("dec %rcx");
        self.emit(&format!("jnz {loop_label}"));
        self.push_raw(&format!("{done_label}:\n"));
        self.emit("pop %rdx");
        self.emit("pop %rcx");
    }

    fn emit_short_circuit(&mut self, op: BinaryOp, left: &Expression, right: &Expression) {
        match op {
            BinaryOp::And => {
                let false_label = self.fresh_label("and_false");
                let end_label = self.fresh_label("and_end");
                self.emit_expression(left);
                self.emit("test %rax, %rax");
                self.emit(&format!("jz {false_label}"));
                self.emit_expression(right);
                self.emit("test %rax, %rax");
                self.emit(&format!("jz {false_label}"));
                self.emit("mov $1, %rax");
                self.emit(&format!("jmp {end_label}"));
                self.push_raw(&format!("{false_label}:\n"));
                self.emit("mov $0, %rax");
                self.push_raw(&format!("{end_label}:\n"));
            }
            BinaryOp::Or => {
                let true_label = self.fresh_label("or_true");
                let end_label = self.fresh_label("or_end");
                self.emit_expression(left);
                self.emit("test %rax, %rax");
                self.emit(&format!("jnz {true_label}"));
                self.emit_expression(right);
                self.emit("test %rax, %rax");
                self.emit(&format!("jnz {true_label}"));
                self.emit("mov $0, %rax");
                self.emit(&format!("jmp {end_label}"));
                self.push_raw(&format!("{true_label}:\n"));
                self.emit("mov $1, %rax");
                self.push_raw(&format!("{end_label}:\n"));
            }
            _ => unreachable!("only and/or short-circuit"),
        }
    }

    fn emit_call(&mut self, name: &str, args: &[Expression]) {
        match name {
            "print" => {
                let Some(arg) = args.first() else {
                    self.emit_comment("print with no arguments");
                    return;
                };
                let support = self.print_target(arg);
                self.emit_expression(arg);
                self.emit(&format!("mov %rax, {}", self.arg_register(0)));
                self.emit(&format!("call {}", self.target.symbol(support)));
            }
            "input" => {
                if let Some(prompt) = args.first() {
                    self.emit_expression(prompt);
                    self.emit(&format!("mov %rax, {}", self.arg_register(0)));
                    self.emit(&format!("call {}", self.target.symbol("orion_input_prompt")));
                } else {
                    self.emit(&format!("call {}", self.target.symbol("orion_input")));
                }
            }
            "range" => {
                let callee = match args.len() {
                    1 => "range_new_stop",
                    2 => "range_new_start_stop",
                    _ => "range_new",
                };
                self.emit_register_call(callee, args);
            }
            "len" => self.emit_register_call("list_len", args),
            "str" | "int" | "float" | "bool" => {
                // Values pass through unchanged; print_smart renders both
                // integers and heap strings.
                self.emit_comment(&format!("{name}() coercion: value passed through"));
                if let Some(arg) = args.first() {
                    self.emit_expression(arg);
                }
            }
            _ => {
                let symbol = self.function_symbol(name);
                self.emit_register_call_symbol(&symbol, args);
            }
        }
    }

    /// Evaluate arguments left to right onto the stack, then pop them into
    /// the ABI registers so a later argument cannot clobber an earlier one.
    fn emit_register_call(&mut self, callee: &str, args: &[Expression]) {
        let symbol = self.target.symbol(callee);
        self.emit_register_call_symbol(&symbol, args);
    }

    fn emit_register_call_symbol(&mut self, symbol: &str, args: &[Expression]) {
        let register_count = self.target.arg_registers.len();
        if args.len() > register_count {
            self.emit_comment(&format!(
                "Warning: call to {symbol} drops arguments beyond the first {register_count}"
            ));
        }
        let passed = args.len().min(register_count);
        for arg in &args[..passed] {
            self.emit_expression(arg);
            self.emit("push %rax");
        }
        for index in (0..passed).rev() {
            self.emit(&format!("pop {}", self.arg_register(index)));
        }
        self.emit(&format!("call {symbol}"));
    }

    fn emit_list_literal(&mut self, elements: &[Expression]) {
        if elements.is_empty() {
            self.emit(&format!("mov $4, {}", self.arg_register(0)));
            self.emit(&format!("call {}", self.target.symbol("list_new")));
            return;
        }

        // Evaluate into a scratch buffer, then let the runtime copy it into
        // a fresh list.
        let byte_count = elements.len() as i64 * 8;
        self.emit(&format!("mov ${byte_count}, {}", self.arg_register(0)));
        self.emit(&format!("call {}", self.target.symbol("orion_malloc")));
        self.emit("mov %rax, %r12");
        for (index, element) in elements.iter().enumerate() {
            self.emit("push %r12");
            self.emit_expression(element);
            self.emit("pop %r12");
            self.emit(&format!("movq %rax, {}(%r12)", index as i64 * 8));
        }
        self.emit(&format!("mov %r12, {}", self.arg_register(0)));
        self.emit(&format!("mov ${}, {}", elements.len(), self.arg_register(1)));
        self.emit(&format!("call {}", self.target.symbol("list_from_data")));
        self.emit("push %rax");
        self.emit(&format!("mov %r12, {}", self.arg_register(0)));
        self.emit(&format!("call {}", self.target.symbol("orion_free")));
        self.emit("pop %rax");
    }

    fn emit_dict_literal(&mut self, pairs: &[(Expression, Expression)]) {
        let capacity = (pairs.len() as i64 * 2).max(8);
        self.emit(&format!("mov ${capacity}, {}", self.arg_register(0)));
        self.emit(&format!("call {}", self.target.symbol("dict_new")));
        self.emit("mov %rax, %r12");
        for (key, value) in pairs {
            self.emit("push %r12");
            self.emit_expression(key);
            self.emit("mov %rax, %r13");
            self.emit("pop %r12");
            self.emit("push %r12");
            self.emit("push %r13");
            self.emit_expression(value);
            self.emit("mov %rax, %r14");
            self.emit("pop %r13");
            self.emit("pop %r12");
            self.emit(&format!("mov %r12, {}", self.arg_register(0)));
            self.emit(&format!("mov %r13, {}", self.arg_register(1)));
            self.emit(&format!("mov %r14, {}", self.arg_register(2)));
            self.emit(&format!("call {}", self.target.symbol("dict_set")));
        }
        self.emit("mov %r12, %rax");
    }

    /// Pick the print support path from what the argument is known to be;
    /// `print_smart` covers everything the table cannot decide.
    fn print_target(&self, arg: &Expression) -> &'static str {
        match arg {
            Expression::Str(_) => "print_str",
            Expression::Int(_) | Expression::Bool(_) => "print_int",
            Expression::Binary { op, .. } if !matches!(op, BinaryOp::And | BinaryOp::Or) => {
                "print_int"
            }
            Expression::Call { name, args } => match name.as_str() {
                "str" => match args.first() {
                    Some(Expression::Str(_)) => "print_str",
                    _ => "print_smart",
                },
                "len" => "print_int",
                _ => match self.function_returns.get(name).map(|ty| ty.kind) {
                    Some(TypeKind::String) => "print_str",
                    Some(TypeKind::Int32 | TypeKind::Int64 | TypeKind::Bool) => "print_int",
                    _ => "print_smart",
                },
            },
            _ => "print_smart",
        }
    }

    /// Assembly support functions appended after all user code.
    fn emit_support_functions(&mut self) {
        self.push_raw("# Runtime support functions\n");
        self.emit_printf_wrapper("print_str", "format_str");
        self.emit_printf_wrapper("print_int", "format_int");
        self.emit_exit();
    }

    fn emit_printf_wrapper(&mut self, name: &str, format_label: &str) {
        self.push_raw(&format!("{}:\n", self.target.symbol(name)));
        self.emit("push %rbp");
        self.emit("mov %rsp, %rbp");
        self.emit(&format!(
            "mov {}, {}",
            self.arg_register(0),
            self.arg_register(1)
        ));
        self.emit(&format!("leaq {format_label}(%rip), {}", self.arg_register(0)));
        self.emit("xor %rax, %rax");
        if self.target.shadow_space > 0 {
            self.emit(&format!("sub ${}, %rsp", self.target.shadow_space));
        }
        self.emit(&format!("call {}", self.target.symbol("printf")));
        self.emit("mov %rbp, %rsp");
        self.emit("pop %rbp");
        self.emit("ret");
        self.push_raw("\n");
    }

    fn emit_exit(&mut self) {
        use crate::target::TargetPlatform;
        self.push_raw(&format!("{}:\n", self.target.symbol("exit")));
        match self.target.platform {
            TargetPlatform::Linux => {
                self.emit("mov $60, %rax");
                self.emit("syscall");
            }
            TargetPlatform::MacOs => {
                self.emit("mov $0x2000001, %rax");
                self.emit("syscall");
            }
            TargetPlatform::Windows => {
                self.emit(&format!("sub ${}, %rsp", self.target.shadow_space));
                self.emit("call ExitProcess");
            }
        }
        self.push_raw("\n");
    }

    /// Slot for `name`, reusing an existing one so reassignment stays put.
    fn variable_slot(&mut self, name: &str) -> i64 {
        if let Some(info) = self.variables.get(name) {
            return info.stack_offset;
        }
        let offset = self.alloc_slot();
        self.variables.insert(
            name.to_string(),
            VariableInfo {
                stack_offset: offset,
                is_parameter: false,
            },
        );
        offset
    }

    fn alloc_slot(&mut self) -> i64 {
        self.stack_offset += 8;
        self.stack_offset
    }

    fn arg_register(&self, index: usize) -> &'static str {
        self.target.arg_registers[index]
    }

    /// User `main` is renamed when the platform entry point already owns the
    /// `main` symbol.
    fn function_symbol(&self, name: &str) -> String {
        if name == "main" && self.target.entry_symbol == "main" {
            self.target.symbol("orion_main")
        } else {
            self.target.symbol(name)
        }
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn collect_strings_in_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VarDecl { init, .. } => {
                if let Some(init) = init {
                    self.collect_strings_in_expression(init);
                }
            }
            Statement::FnDecl { body, .. } => match body {
                FnBody::Expression(expression) => self.collect_strings_in_expression(expression),
                FnBody::Block(statements) => {
                    for statement in statements {
                        self.collect_strings_in_statement(statement);
                    }
                }
            },
            Statement::Block(statements) => {
                for statement in statements {
                    self.collect_strings_in_statement(statement);
                }
            }
            Statement::Expr(expression) => self.collect_strings_in_expression(expression),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.collect_strings_in_expression(condition);
                self.collect_strings_in_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.collect_strings_in_statement(else_branch);
                }
            }
            Statement::While { condition, body } => {
                self.collect_strings_in_expression(condition);
                self.collect_strings_in_statement(body);
            }
            Statement::ForIn { iterable, body, .. } => {
                self.collect_strings_in_expression(iterable);
                self.collect_strings_in_statement(body);
            }
            Statement::Return(Some(value)) => self.collect_strings_in_expression(value),
            Statement::TupleAssign { values, .. } => {
                for value in values {
                    self.collect_strings_in_expression(value);
                }
            }
            _ => {}
        }
    }

    fn collect_strings_in_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Str(value) => {
                if !self.string_labels.contains_key(value) {
                    let label = format!("str_{}", self.string_labels.len());
                    self.string_labels.insert(value.clone(), label.clone());
                    self.string_pool.push((label, value.clone()));
                }
            }
            Expression::Binary { left, right, .. } => {
                self.collect_strings_in_expression(left);
                self.collect_strings_in_expression(right);
            }
            Expression::Unary { operand, .. } => self.collect_strings_in_expression(operand),
            Expression::Call { args, .. } => {
                for arg in args {
                    self.collect_strings_in_expression(arg);
                }
            }
            Expression::Index { object, index } => {
                self.collect_strings_in_expression(object);
                self.collect_strings_in_expression(index);
            }
            Expression::Tuple(elements) | Expression::List(elements) => {
                for element in elements {
                    self.collect_strings_in_expression(element);
                }
            }
            Expression::Dict(pairs) => {
                for (key, value) in pairs {
                    self.collect_strings_in_expression(key);
                    self.collect_strings_in_expression(value);
                }
            }
            _ => {}
        }
    }

    fn emit(&mut self, instruction: &str) {
        self.output.push_str("    ");
        self.output.push_str(instruction);
        self.output.push('\n');
    }

    fn emit_comment(&mut self, comment: &str) {
        self.output.push_str("    # ");
        self.output.push_str(comment);
        self.output.push('\n');
    }

    fn push_raw(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

fn escape_asm(value: &str) -> String {
    let mut escaped = String::new();
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Upper bound on the 8-byte slots a statement needs; the frame is reserved
/// before any body code runs.
fn count_slots(statement: &Statement) -> i64 {
    match statement {
        Statement::VarDecl { .. } => 1,
        Statement::TupleAssign { targets, .. } => targets.len() as i64,
        Statement::Block(statements) => statements.iter().map(count_slots).sum(),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            count_slots(then_branch)
                + else_branch
                    .as_deref()
                    .map(count_slots)
                    .unwrap_or(0)
        }
        Statement::While { body, .. } => count_slots(body),
        // Iterable pointer, cached length, index, loop variable.
        Statement::ForIn { body, .. } => 4 + count_slots(body),
        _ => 0,
    }
}
