use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Constraint kinds that `ADD CONSTRAINT name KIND (definition)` accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    Check,
    PrimaryKey,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => write!(f, "UNIQUE"),
            Self::Check => write!(f, "CHECK"),
            Self::PrimaryKey => write!(f, "PRIMARY KEY"),
        }
    }
}

impl std::str::FromStr for ConstraintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('_', " ").as_str() {
            "UNIQUE" => Ok(Self::Unique),
            "CHECK" => Ok(Self::Check),
            "PRIMARY KEY" | "PK" => Ok(Self::PrimaryKey),
            other => Err(format!("unsupported constraint type '{other}'")),
        }
    }
}

/// One row of `information_schema.table_constraints`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintInfo {
    pub name: String,
    pub constraint_type: String,
}
