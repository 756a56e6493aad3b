//! Spinlock com interrupções desabilitadas - a seção crítica do motor
//!
//! Mesmo contrato do Spinlock do kernel: busy-wait, NÃO pode dormir, e o
//! guard restaura o estado de interrupções ao sair do escopo. A máscara de
//! interrupções vem do `PmHal` em vez da camada arch, para que múltiplas
//! instâncias simuladas convivam nos testes.
//!
//! # Quando usar
//!
//! - Seções críticas MUITO curtas (O(1))
//! - Dentro de handlers de interrupção
//!
//! Nunca segurar através da reprogramação do clock ou do busy-wait do
//! handshake entre cores.

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use crate::hal::PmHal;

/// Spinlock interrupt-safe protegendo o estado compartilhado do motor
pub struct IrqSpinlock<T> {
    inner: spin::Mutex<T>,
}

impl<T> IrqSpinlock<T> {
    /// Cria novo spinlock
    pub const fn new(data: T) -> Self {
        Self {
            inner: spin::Mutex::new(data),
        }
    }

    /// Adquire o lock com interrupções locais desabilitadas
    pub fn lock<'a, H: PmHal>(&'a self, hal: &'a H) -> IrqSpinlockGuard<'a, T, H> {
        // Desabilitar interrupções antes de adquirir
        let interrupts_were_enabled = hal.irq_save();

        IrqSpinlockGuard {
            inner: ManuallyDrop::new(self.inner.lock()),
            hal,
            interrupts_were_enabled,
        }
    }
}

/// Guard do spinlock - libera o lock e restaura interrupções ao sair do escopo
pub struct IrqSpinlockGuard<'a, T, H: PmHal> {
    inner: ManuallyDrop<spin::MutexGuard<'a, T>>,
    hal: &'a H,
    interrupts_were_enabled: bool,
}

impl<T, H: PmHal> Deref for IrqSpinlockGuard<'_, T, H> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T, H: PmHal> DerefMut for IrqSpinlockGuard<'_, T, H> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T, H: PmHal> Drop for IrqSpinlockGuard<'_, T, H> {
    fn drop(&mut self) {
        // Liberar o lock ANTES de reabilitar interrupções: um handler neste
        // core pode tentar adquirir o mesmo lock.
        // SAFETY: o guard interno não é usado após este ponto
        unsafe { ManuallyDrop::drop(&mut self.inner) };
        self.hal.irq_restore(self.interrupts_were_enabled);
    }
}
