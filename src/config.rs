//! Arquivo: config.rs
//!
//! Propósito: Pontos de frequência suportados e derivação da tabela
//! modo -> frequência a partir da configuração (min, max, sleep).
//!
//! Detalhes de Implementação:
//! - Frequências em MHz; ticks do cycle counter por microssegundo == MHz.
//! - APB_MAX não pode usar 80 MHz quando CPU_MAX é 240 MHz: a troca
//!   240 <-> 80/160 exigiria religar o PLL, então APB_MAX herda 240.

use crate::error::{PmError, PmResult};
use crate::mode::{Mode, MODE_COUNT};

/// Unidade de frequência em MHz
pub type FrequencyMhz = u32;

/// Frequência do cristal: piso absoluto de operação
pub const FREQ_XTAL_MHZ: FrequencyMhz = 40;

/// Pontos de frequência que o clock tree consegue programar
pub const SUPPORTED_FREQS_MHZ: [FrequencyMhz; 4] = [40, 80, 160, 240];

/// Teto de ticks/us do barramento APB (o timer de referência satura aqui)
pub const APB_MAX_TICKS_PER_US: u32 = 80;

/// Configuração do gerenciamento de energia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmConfig {
    /// Frequência alvo do modo CPU_MAX
    pub max_freq_mhz: FrequencyMhz,
    /// Frequência alvo dos modos APB_MIN e LIGHT_SLEEP
    pub min_freq_mhz: FrequencyMhz,
    /// Habilita entrada automática em light sleep quando não há locks
    pub light_sleep_enable: bool,
}

impl Default for PmConfig {
    fn default() -> Self {
        Self {
            max_freq_mhz: 160,
            min_freq_mhz: FREQ_XTAL_MHZ,
            light_sleep_enable: false,
        }
    }
}

/// Verifica se a frequência é um ponto programável do clock tree.
///
/// Frequências abaixo do cristal (ex: 2 MHz por divisor) ficam de fora:
/// não é possível derivar o tick de referência de 1 MHz nelas.
pub fn is_supported_freq(freq_mhz: FrequencyMhz) -> bool {
    SUPPORTED_FREQS_MHZ.contains(&freq_mhz)
}

/// Valida o par (min, max) de uma configuração
pub(crate) fn validate(config: &PmConfig) -> PmResult<()> {
    if !is_supported_freq(config.min_freq_mhz) || !is_supported_freq(config.max_freq_mhz) {
        return Err(PmError::UnsupportedFrequency);
    }
    if config.min_freq_mhz > config.max_freq_mhz {
        return Err(PmError::InvalidConfig);
    }
    Ok(())
}

/// Deriva a tabela modo -> frequência para uma configuração já validada.
pub(crate) fn compute_mode_table(
    min_freq_mhz: FrequencyMhz,
    max_freq_mhz: FrequencyMhz,
) -> [FrequencyMhz; MODE_COUNT] {
    // Frequência da CPU no modo APB_MAX
    let mut apb_max_freq = max_freq_mhz;
    if max_freq_mhz == 240 {
        // Não dá para alternar entre 240 e 80/160 sem desligar o PLL
        apb_max_freq = 240;
    } else if max_freq_mhz == 160 || max_freq_mhz == 80 {
        apb_max_freq = 80;
    }
    apb_max_freq = apb_max_freq.max(min_freq_mhz);

    let mut table = [min_freq_mhz; MODE_COUNT];
    table[Mode::CpuMax.index()] = max_freq_mhz;
    table[Mode::ApbMax.index()] = apb_max_freq;
    table[Mode::ApbMin.index()] = min_freq_mhz;
    table[Mode::LightSleep.index()] = min_freq_mhz;
    table
}
