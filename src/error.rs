//! Tipos de Erro do Subsistema de Energia
//!
//! Define erros estruturados para as operações de configuração e locks.
//! Erros de uso são reportados ao chamador; nunca são mascarados.

/// Erros do subsistema de energia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmError {
    /// Configuração inválida (min > max, tick rate zero, topologia)
    InvalidConfig,
    /// Frequência fora dos pontos suportados pelo clock tree
    UnsupportedFrequency,
    /// Release/unlock de um lock sem referências (underflow)
    NotHeld,
}

impl PmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "Configuração inválida",
            Self::UnsupportedFrequency => "Frequência de CPU não suportada",
            Self::NotHeld => "Lock sem referências ativas (underflow)",
        }
    }
}

impl core::fmt::Display for PmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico para operações do subsistema de energia
pub type PmResult<T> = Result<T, PmError>;
