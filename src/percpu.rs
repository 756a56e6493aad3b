//! Arquivo: percpu.rs
//!
//! Propósito: Flags booleanas com uma instância por core.
//! Usadas para o flag de ressincronização do cycle-compare (escrito pelo
//! core iniciador, limpo pelo handler do core dono) e para o flag de idle.
//!
//! Detalhes de Implementação:
//! - Array fixo indexado pelo id do core, como as variáveis Per-CPU do
//!   kernel, porém com atômicos: o flag de sync é escrito por dois lados.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::hal::MAX_CPUS;

/// Flag booleana replicada por core
pub struct PerCpuFlag {
    // Inicialização manual pois AtomicBool não é Copy
    flags: [AtomicBool; MAX_CPUS],
}

impl PerCpuFlag {
    /// Cria o conjunto de flags, todas desligadas
    pub const fn new() -> Self {
        Self {
            flags: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
        }
    }

    /// Lê o flag do core indicado
    #[inline]
    pub fn get(&self, core: usize) -> bool {
        self.flags[core].load(Ordering::Acquire)
    }

    /// Liga o flag do core indicado
    #[inline]
    pub fn set(&self, core: usize) {
        self.flags[core].store(true, Ordering::Release);
    }

    /// Desliga o flag do core indicado
    #[inline]
    pub fn clear(&self, core: usize) {
        self.flags[core].store(false, Ordering::Release);
    }
}

impl Default for PerCpuFlag {
    fn default() -> Self {
        Self::new()
    }
}
