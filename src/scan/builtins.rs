//! Names that are always bound in a Python module.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // functions
        "abs", "aiter", "all", "anext", "any", "ascii", "bin", "breakpoint", "callable", "chr",
        "compile", "delattr", "dir", "divmod", "enumerate", "eval", "exec", "filter", "format",
        "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input", "isinstance",
        "issubclass", "iter", "len", "locals", "map", "max", "min", "next", "oct", "open", "ord",
        "pow", "print", "repr", "reversed", "round", "setattr", "sorted", "sum", "vars", "zip",
        "__import__", "__build_class__",
        // types
        "bool", "bytearray", "bytes", "classmethod", "complex", "dict", "float", "frozenset",
        "int", "list", "memoryview", "object", "property", "range", "set", "slice", "staticmethod",
        "str", "super", "tuple", "type",
        // constants
        "True", "False", "None", "Ellipsis", "NotImplemented", "__debug__",
        // interactive helpers
        "copyright", "credits", "exit", "license", "quit",
        // module attributes
        "__name__", "__file__", "__doc__", "__package__", "__spec__", "__loader__",
        "__builtins__", "__annotations__", "__dict__", "__qualname__", "__module__", "__class__",
        // exceptions
        "BaseException", "BaseExceptionGroup", "Exception", "ExceptionGroup", "ArithmeticError",
        "AssertionError", "AttributeError", "BlockingIOError", "BrokenPipeError", "BufferError",
        "ChildProcessError", "ConnectionAbortedError", "ConnectionError",
        "ConnectionRefusedError", "ConnectionResetError", "EOFError", "EnvironmentError",
        "FileExistsError", "FileNotFoundError", "FloatingPointError", "GeneratorExit", "IOError",
        "ImportError", "IndentationError", "IndexError", "InterruptedError", "IsADirectoryError",
        "KeyError", "KeyboardInterrupt", "LookupError", "MemoryError", "ModuleNotFoundError",
        "NameError", "NotADirectoryError", "NotImplementedError", "OSError", "OverflowError",
        "PermissionError", "ProcessLookupError", "RecursionError", "ReferenceError",
        "RuntimeError", "StopAsyncIteration", "StopIteration", "SyntaxError", "SystemError",
        "SystemExit", "TabError", "TimeoutError", "TypeError", "UnboundLocalError",
        "UnicodeDecodeError", "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError",
        "ValueError", "ZeroDivisionError",
        // warnings
        "BytesWarning", "DeprecationWarning", "EncodingWarning", "FutureWarning", "ImportWarning",
        "PendingDeprecationWarning", "ResourceWarning", "RuntimeWarning", "SyntaxWarning",
        "UnicodeWarning", "UserWarning", "Warning",
    ]
    .into_iter()
    .collect()
});

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(name)
}

#[cfg(test)]
mod tests {
    use super::is_builtin;

    #[test]
    fn recognises_common_builtins() {
        for name in ["print", "len", "ValueError", "__name__", "True"] {
            assert!(is_builtin(name), "{name} should be builtin");
        }
        assert!(!is_builtin("numpy"));
        assert!(!is_builtin("x"));
    }
}
