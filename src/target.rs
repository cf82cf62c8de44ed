//! Per-platform ABI and object-format configuration.
//!
//! Everything the code generator needs to retarget lives in one data-driven
//! record per platform: argument registers, shadow space, symbol prefixing,
//! section directives, and the link command handed to the external C
//! toolchain.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Linux,
    MacOs,
    Windows,
}

impl TargetPlatform {
    /// Platform the compiler itself is running on.
    pub fn detect_host() -> Self {
        if cfg!(target_os = "windows") {
            TargetPlatform::Windows
        } else if cfg!(target_os = "macos") {
            TargetPlatform::MacOs
        } else {
            TargetPlatform::Linux
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linux" => Some(TargetPlatform::Linux),
            "macos" => Some(TargetPlatform::MacOs),
            "windows" => Some(TargetPlatform::Windows),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TargetPlatform::Linux => "linux",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Windows => "windows",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Target {
    pub platform: TargetPlatform,
    /// Integer argument registers in call order.
    pub arg_registers: &'static [&'static str],
    pub callee_saved: &'static [&'static str],
    /// Bytes the caller reserves above a callee's arguments (Win64 only).
    pub shadow_space: i64,
    pub red_zone: bool,
    pub varargs_al: bool,
    pub stack_alignment: i64,
    pub symbol_prefix: &'static str,
    pub exe_suffix: &'static str,
    pub data_section: &'static str,
    pub text_section: &'static str,
    pub entry_symbol: &'static str,
    /// Template with `{exe}` and `{asm}` placeholders.
    pub link_command: &'static str,
}

const SYSV_ARG_REGISTERS: &[&str] = &["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
const SYSV_CALLEE_SAVED: &[&str] = &["%rbx", "%rbp", "%r12", "%r13", "%r14", "%r15"];
const WIN64_ARG_REGISTERS: &[&str] = &["%rcx", "%rdx", "%r8", "%r9"];
const WIN64_CALLEE_SAVED: &[&str] = &[
    "%rbx", "%rbp", "%rdi", "%rsi", "%r12", "%r13", "%r14", "%r15",
];

impl Target {
    pub fn for_platform(platform: TargetPlatform) -> Self {
        match platform {
            TargetPlatform::Linux => Target {
                platform,
                arg_registers: SYSV_ARG_REGISTERS,
                callee_saved: SYSV_CALLEE_SAVED,
                shadow_space: 0,
                red_zone: true,
                varargs_al: false,
                stack_alignment: 16,
                symbol_prefix: "",
                exe_suffix: "",
                data_section: ".section .data",
                text_section: ".section .text",
                entry_symbol: "_start",
                link_command: "gcc -o {exe} {asm} runtime.o -lm",
            },
            TargetPlatform::MacOs => Target {
                platform,
                arg_registers: SYSV_ARG_REGISTERS,
                callee_saved: SYSV_CALLEE_SAVED,
                shadow_space: 0,
                red_zone: true,
                varargs_al: false,
                stack_alignment: 16,
                symbol_prefix: "_",
                exe_suffix: "",
                data_section: ".section __DATA,__data",
                text_section: ".section __TEXT,__text",
                entry_symbol: "main",
                link_command: "clang -o {exe} {asm} runtime.o -lm",
            },
            TargetPlatform::Windows => Target {
                platform,
                arg_registers: WIN64_ARG_REGISTERS,
                callee_saved: WIN64_CALLEE_SAVED,
                shadow_space: 32,
                red_zone: false,
                varargs_al: true,
                stack_alignment: 16,
                symbol_prefix: "",
                exe_suffix: ".exe",
                data_section: ".section .data",
                text_section: ".section .text",
                entry_symbol: "main",
                link_command: "gcc -m64 -o {exe} {asm} runtime.o",
            },
        }
    }

    pub fn host() -> Self {
        Self::for_platform(TargetPlatform::detect_host())
    }

    /// Apply the platform's symbol prefix (`_` on Mach-O).
    pub fn symbol(&self, name: &str) -> String {
        format!("{}{}", self.symbol_prefix, name)
    }

    /// Round a frame size up to the platform's stack alignment.
    pub fn align_stack(&self, bytes: i64) -> i64 {
        let align = self.stack_alignment;
        (bytes + align - 1) / align * align
    }

    /// Concrete link invocation for an assembly file and output path.
    pub fn link_invocation(&self, asm_path: &str, exe_path: &str) -> String {
        self.link_command
            .replace("{exe}", exe_path)
            .replace("{asm}", asm_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_uses_sysv_registers_without_prefix() {
        let target = Target::for_platform(TargetPlatform::Linux);
        assert_eq!(target.arg_registers[0], "%rdi");
        assert_eq!(target.arg_registers.len(), 6);
        assert_eq!(target.shadow_space, 0);
        assert!(target.red_zone);
        assert!(!target.varargs_al);
        assert_eq!(target.symbol("list_new"), "list_new");
        assert_eq!(target.entry_symbol, "_start");
    }

    #[test]
    fn macos_prefixes_symbols_and_uses_mach_o_sections() {
        let target = Target::for_platform(TargetPlatform::MacOs);
        assert_eq!(target.symbol("main"), "_main");
        assert_eq!(target.data_section, ".section __DATA,__data");
        assert_eq!(target.text_section, ".section __TEXT,__text");
        assert_eq!(target.entry_symbol, "main");
        assert!(target.link_command.starts_with("clang"));
    }

    #[test]
    fn windows_uses_win64_convention() {
        let target = Target::for_platform(TargetPlatform::Windows);
        assert_eq!(target.arg_registers, &["%rcx", "%rdx", "%r8", "%r9"]);
        assert_eq!(target.shadow_space, 32);
        assert!(!target.red_zone);
        assert!(target.varargs_al);
        assert!(target.callee_saved.contains(&"%rdi"));
        assert!(target.callee_saved.contains(&"%rsi"));
        assert_eq!(target.exe_suffix, ".exe");
    }

    #[test]
    fn aligns_frame_sizes_to_sixteen_bytes() {
        let target = Target::for_platform(TargetPlatform::Linux);
        assert_eq!(target.align_stack(0), 0);
        assert_eq!(target.align_stack(8), 16);
        assert_eq!(target.align_stack(16), 16);
        assert_eq!(target.align_stack(40), 48);
    }

    #[test]
    fn link_invocation_substitutes_paths() {
        let target = Target::for_platform(TargetPlatform::Linux);
        assert_eq!(
            target.link_invocation("out.s", "out"),
            "gcc -o out out.s runtime.o -lm"
        );
    }

    #[test]
    fn resolves_platform_names() {
        assert_eq!(
            TargetPlatform::from_name("windows"),
            Some(TargetPlatform::Windows)
        );
        assert_eq!(TargetPlatform::from_name("solaris"), None);
    }
}
