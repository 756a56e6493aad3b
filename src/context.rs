//! Arquivo: context.rs
//!
//! Propósito: Contexto do motor de energia - registro de locks, estado do
//! modo corrente e pontos de entrada de configuração.
//!
//! Detalhes de Implementação:
//! - Todo o estado mutável compartilhado mora em `PmState`, protegido por
//!   um único `IrqSpinlock`. Seções críticas são O(1): a troca de
//!   frequência em si executa FORA do lock (pode bloquear no handshake).
//! - Nenhuma alocação dinâmica: tabelas fixas indexadas por modo/core.
//! - Contexto explícito em vez de statics, para permitir várias instâncias
//!   simuladas em teste.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::{self, FrequencyMhz, PmConfig};
use crate::error::{PmError, PmResult};
use crate::hal::{PmHal, MAX_CPUS};
use crate::mode::{lowest_allowed_mode, Mode, ModeMask, MODE_COUNT};
use crate::percpu::PerCpuFlag;
use crate::sync::IrqSpinlock;

#[cfg(feature = "profiling")]
use crate::stats::ModeStats;

/// Tipos de lock expostos aos clientes, mapeados para um modo mínimo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmLockKind {
    /// Exige a frequência máxima de CPU
    CpuFreqMax,
    /// Exige a frequência máxima do barramento APB
    ApbFreqMax,
    /// Apenas impede light sleep (frequência mínima serve)
    NoLightSleep,
}

impl PmLockKind {
    /// Modo mínimo garantido por este tipo de lock
    pub fn mode(self) -> Mode {
        match self {
            PmLockKind::CpuFreqMax => Mode::CpuMax,
            PmLockKind::ApbFreqMax => Mode::ApbMax,
            PmLockKind::NoLightSleep => Mode::ApbMin,
        }
    }
}

/// Direção de uma operação no registro de locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockOp {
    Lock,
    Unlock,
}

/// Estado compartilhado, protegido pelo spinlock do contexto
pub(crate) struct PmState {
    /// Modo corrente; durante uma troca, mantém o modo antigo até o commit
    pub mode: Mode,
    /// Uma troca de modo está em andamento
    pub is_switching: bool,
    /// Referências ativas por modo
    pub lock_counts: [u32; MODE_COUNT],
    /// Bit m setado sse lock_counts[m] > 0 (invariante de toda mutação)
    pub mode_mask: ModeMask,
    /// Tabela modo -> frequência alvo
    pub freq_by_mode: [FrequencyMhz; MODE_COUNT],
    /// Light sleep automático habilitado
    pub light_sleep_enabled: bool,
    /// A configuração mudou desde a última troca: a próxima troca deve ler
    /// a frequência real do hardware em vez de confiar na tabela
    pub config_changed: bool,
    #[cfg(feature = "profiling")]
    pub stats: ModeStats,
}

impl PmState {
    const fn boot() -> Self {
        Self {
            // Parte na maior performance: um lock baseline por core é
            // adquirido no init antes de qualquer task rodar
            mode: Mode::CpuMax,
            is_switching: false,
            lock_counts: [0; MODE_COUNT],
            mode_mask: ModeMask::empty(),
            freq_by_mode: [config::FREQ_XTAL_MHZ; MODE_COUNT],
            light_sleep_enabled: false,
            config_changed: false,
            #[cfg(feature = "profiling")]
            stats: ModeStats::new(),
        }
    }
}

/// Contexto do motor de energia.
///
/// Uma instância por sistema; o kernel injeta a implementação de `PmHal`
/// e chama os hooks de idle/ISR/sleep a partir do scheduler.
pub struct PmContext<H: PmHal> {
    pub(crate) hal: H,
    pub(crate) state: IrqSpinlock<PmState>,
    /// Fatores de reescala (novo/antigo ticks-por-us) do cycle-compare.
    /// Só são != 0 enquanto uma troca está em andamento.
    pub(crate) ccount_mul: AtomicU32,
    pub(crate) ccount_div: AtomicU32,
    /// Ciclos do cycle counter por tick do scheduler, na frequência corrente
    pub(crate) tick_divisor: AtomicU32,
    /// Frequência de tick do scheduler (Hz), fixada no init
    pub(crate) tick_hz: AtomicU32,
    /// "Este core precisa recalcular o cycle-compare" (setado pelo core
    /// iniciador da troca, limpo pelo handler do core dono)
    pub(crate) ccompare_pending: PerCpuFlag,
    /// "Este core liberou seu lock baseline" (só o próprio core escreve)
    pub(crate) core_idle: PerCpuFlag,
    /// Locks baseline criados (fim do init): habilita a ressincronização
    pub(crate) init_done: AtomicBool,
}

impl<H: PmHal> PmContext<H> {
    /// Cria o contexto em estado de boot (modo CPU_MAX, sem locks)
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            state: IrqSpinlock::new(PmState::boot()),
            ccount_mul: AtomicU32::new(0),
            ccount_div: AtomicU32::new(0),
            tick_divisor: AtomicU32::new(0),
            tick_hz: AtomicU32::new(0),
            ccompare_pending: PerCpuFlag::new(),
            core_idle: PerCpuFlag::new(),
            init_done: AtomicBool::new(false),
        }
    }

    /// Acesso à camada de hardware injetada
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Modo de energia corrente
    pub fn mode(&self) -> Mode {
        self.state.lock(&self.hal).mode
    }

    /// Inicializa o motor: tabela com a frequência de boot e um lock
    /// baseline CPU_MAX por core (liberado no idle de cada core).
    ///
    /// Deve rodar antes do scheduler iniciar e antes de `configure`.
    pub fn init(&self, boot_freq_mhz: FrequencyMhz, tick_hz: u32) -> PmResult<()> {
        if !config::is_supported_freq(boot_freq_mhz) {
            return Err(PmError::UnsupportedFrequency);
        }
        if tick_hz == 0 || tick_hz > 1_000_000 {
            return Err(PmError::InvalidConfig);
        }
        let num_cpus = self.hal.num_cpus();
        if num_cpus == 0 || num_cpus > MAX_CPUS {
            return Err(PmError::InvalidConfig);
        }

        {
            let mut st = self.state.lock(&self.hal);
            // Todos os modos começam na frequência de boot; `configure`
            // substitui a tabela depois.
            st.freq_by_mode = [boot_freq_mhz; MODE_COUNT];
        }
        self.tick_hz.store(tick_hz, Ordering::Release);
        self.tick_divisor
            .store(boot_freq_mhz * 1_000_000 / tick_hz, Ordering::Release);

        // Um lock baseline por core, já adquirido
        for _ in 0..num_cpus {
            self.apply(Mode::CpuMax, LockOp::Lock)?;
        }
        self.init_done.store(true, Ordering::Release);

        log::info!(
            "pm: init at {} MHz, tick {} Hz, {} core(s)",
            boot_freq_mhz,
            tick_hz,
            num_cpus
        );
        Ok(())
    }

    /// Reconfigura os alvos de frequência e o light sleep automático.
    ///
    /// Só recalcula a tabela; a frequência física muda na próxima troca de
    /// modo (o flag `config_changed` faz a troca ler a frequência real do
    /// hardware, pois o alvo cacheado do modo corrente pode ter mudado).
    pub fn configure(&self, cfg: &PmConfig) -> PmResult<()> {
        config::validate(cfg)?;

        let table = config::compute_mode_table(cfg.min_freq_mhz, cfg.max_freq_mhz);
        log::info!(
            "pm: frequency switching config: CPU_MAX {} MHz, APB_MAX {} MHz, APB_MIN {} MHz, light sleep {}",
            table[Mode::CpuMax.index()],
            table[Mode::ApbMax.index()],
            table[Mode::ApbMin.index()],
            if cfg.light_sleep_enable { "ENABLED" } else { "DISABLED" }
        );

        let mut st = self.state.lock(&self.hal);
        st.freq_by_mode = table;
        st.light_sleep_enabled = cfg.light_sleep_enable;
        st.config_changed = true;
        Ok(())
    }

    /// Cria um handle de lock vinculado a um tipo (e portanto a um modo)
    pub fn new_lock(&self, kind: PmLockKind) -> PmLockHandle<'_, H> {
        PmLockHandle {
            ctx: self,
            mode: kind.mode(),
            count: AtomicU32::new(0),
        }
    }

    /// Operação do registro de locks: atualiza contagem e máscara dentro de
    /// UMA aquisição da seção crítica; a troca resultante executa depois de
    /// soltar o lock (pode bloquear no handshake entre cores).
    pub(crate) fn apply(&self, mode: Mode, op: LockOp) -> PmResult<()> {
        #[cfg(feature = "profiling")]
        let now = self.hal.now_us();

        let mut need_switch = false;
        let new_mode;
        {
            let mut st = self.state.lock(&self.hal);
            let idx = mode.index();
            let count = match op {
                LockOp::Lock => {
                    st.lock_counts[idx] += 1;
                    st.lock_counts[idx]
                }
                LockOp::Unlock => {
                    if st.lock_counts[idx] == 0 {
                        // Erro de programação do cliente: reportar, nunca
                        // saturar silenciosamente
                        return Err(PmError::NotHeld);
                    }
                    let before = st.lock_counts[idx];
                    st.lock_counts[idx] -= 1;
                    before
                }
            };

            // Transição 0<->1: a máscara muda e a arbitragem roda
            if count == 1 {
                match op {
                    LockOp::Lock => st.mode_mask.insert(mode.mask()),
                    LockOp::Unlock => st.mode_mask.remove(mode.mask()),
                }
                need_switch = true;
            }

            new_mode = if need_switch {
                #[cfg(feature = "profiling")]
                {
                    let old_mode = st.mode;
                    st.stats.note_mode_change(old_mode, now);
                }
                lowest_allowed_mode(st.mode_mask, st.light_sleep_enabled)
            } else {
                st.mode
            };
        }

        if need_switch {
            self.do_switch(new_mode);
        }
        Ok(())
    }
}

/// Handle opaco de lock de performance.
///
/// Vinculado a um modo na criação; `acquire`/`release` aninham por
/// contagem de referências. `release` de um handle não adquirido é um
/// erro reportado.
pub struct PmLockHandle<'a, H: PmHal> {
    ctx: &'a PmContext<H>,
    mode: Mode,
    count: AtomicU32,
}

impl<H: PmHal> PmLockHandle<'_, H> {
    /// Modo mínimo garantido enquanto o handle estiver adquirido
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// O handle tem ao menos uma aquisição ativa?
    pub fn is_held(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    /// Adquire o lock; só a transição 0->1 chega ao registro.
    ///
    /// Garantia de ordem: quando `acquire` retorna, o modo corrente já é
    /// maior ou igual ao modo do handle.
    pub fn acquire(&self) -> PmResult<()> {
        if self.count.fetch_add(1, Ordering::AcqRel) == 0 {
            self.ctx.apply(self.mode, LockOp::Lock)
        } else {
            Ok(())
        }
    }

    /// Libera uma aquisição; só a transição 1->0 chega ao registro
    pub fn release(&self) -> PmResult<()> {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(PmError::NotHeld);
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        if current == 1 {
            self.ctx.apply(self.mode, LockOp::Unlock)
        } else {
            Ok(())
        }
    }
}
