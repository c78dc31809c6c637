/// How to build and run one guest language inside the sandbox.
#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
    /// Key carried on the submission (e.g., "cpp").
    pub key: &'static str,
    /// Container image the sandbox is created from.
    pub image: &'static str,
    /// Path the contestant source is copied to inside the container.
    pub source_file: &'static str,
    /// Build command, for languages with a compile step.
    pub compile: Option<&'static [&'static str]>,
    /// Run command.
    pub run: &'static [&'static str],
}

pub const LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        key: "cpp",
        image: "gcc:13",
        source_file: "/tmp/main.cpp",
        compile: Some(&[
            "g++",
            "-O2",
            "-std=c++17",
            "-o",
            "/tmp/solution",
            "/tmp/main.cpp",
        ]),
        run: &["/tmp/solution"],
    },
    LanguageSpec {
        key: "c",
        image: "gcc:13",
        source_file: "/tmp/main.c",
        compile: Some(&["gcc", "-O2", "-std=c17", "-o", "/tmp/solution", "/tmp/main.c"]),
        run: &["/tmp/solution"],
    },
    LanguageSpec {
        key: "java",
        image: "eclipse-temurin:21",
        source_file: "/tmp/Main.java",
        compile: Some(&["javac", "/tmp/Main.java"]),
        run: &["java", "-cp", "/tmp", "Main"],
    },
    LanguageSpec {
        key: "python",
        image: "python:3.12-alpine",
        source_file: "/tmp/main.py",
        compile: None,
        run: &["python3", "/tmp/main.py"],
    },
    LanguageSpec {
        key: "node",
        image: "node:20-alpine",
        source_file: "/tmp/main.js",
        compile: None,
        run: &["node", "/tmp/main.js"],
    },
];

pub fn find_language(key: &str) -> Option<&'static LanguageSpec> {
    LANGUAGES.iter().find(|lang| lang.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language_lookup() {
        let cpp = find_language("cpp").unwrap();
        assert!(cpp.compile.is_some());
        assert_eq!(cpp.run, &["/tmp/solution"]);
    }

    #[test]
    fn test_unknown_language_lookup() {
        assert!(find_language("cobol").is_none());
    }
}
