//! Brasa - Motor de Gerenciamento Dinâmico de Energia.
//!
//! Clientes independentes pedem garantias mínimas de performance (locks);
//! o motor computa o menor modo de energia consistente com todos os locks
//! e transiciona o sistema inteiro de frequência sem perder ticks do
//! scheduler nem corromper timers em voo (ressincronização do
//! cycle-compare em todos os cores, com handshake por IPI).
//!
//! O kernel injeta as primitivas de hardware via [`PmHal`] e chama os
//! hooks de idle/ISR/sleep a partir do scheduler.

#![no_std]

#[cfg(test)]
extern crate std;

// --- Tipos e Arbitragem ---
pub mod config; // Pontos de frequência e tabela modo -> frequência
pub mod error; // Erros do subsistema
pub mod mode; // Modos de energia, máscara de requisições, árbitro

// --- Fronteiras ---
pub mod hal; // Trait de primitivas de hardware/scheduler

// --- Infraestrutura ---
pub mod percpu; // Flags por core
pub mod sync; // Spinlock interrupt-safe

// --- Motor ---
pub mod context; // Contexto, registro de locks, handles
mod idle; // Hooks de idle/ISR e decisão de sleep
mod switch; // Protocolo de troca de frequência e ressincronização

#[cfg(feature = "profiling")]
mod stats; // Contabilidade de tempo-por-modo

#[cfg(test)]
mod tests;

pub use config::{FrequencyMhz, PmConfig, SUPPORTED_FREQS_MHZ};
pub use context::{PmContext, PmLockHandle, PmLockKind};
pub use error::{PmError, PmResult};
pub use hal::{PmHal, MAX_CPUS};
pub use mode::{lowest_allowed_mode, Mode, ModeMask, MODE_COUNT};
