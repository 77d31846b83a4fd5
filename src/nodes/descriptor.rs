use serde::Serialize;

/// What a node declares to the host at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSpec {
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    String {
        multiline: bool,
        default: &'static str,
    },
    Int {
        default: i64,
        min: i64,
        max: i64,
    },
    Enum {
        choices: Vec<&'static str>,
        default: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    String,
    StringList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSpec {
    pub name: &'static str,
    pub kind: OutputKind,
}

impl InputSpec {
    pub fn text(name: &'static str, default: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::String {
                multiline: false,
                default,
            },
            required: true,
            description,
        }
    }

    pub fn multiline(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::String {
                multiline: true,
                default: "",
            },
            required: true,
            description,
        }
    }

    pub fn int(name: &'static str, default: i64, min: i64, max: i64, description: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::Int { default, min, max },
            required: true,
            description,
        }
    }

    pub fn choice(
        name: &'static str,
        choices: &[&'static str],
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: InputKind::Enum {
                choices: choices.to_vec(),
                default,
            },
            required: true,
            description,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl OutputSpec {
    pub fn new(name: &'static str, kind: OutputKind) -> Self {
        Self { name, kind }
    }
}

impl NodeDescriptor {
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }
}
