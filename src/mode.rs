//! Arquivo: mode.rs
//!
//! Propósito: Definição dos Modos de Energia e do árbitro.
//! Cada modo é um patamar global de performance/consumo; clientes seguram
//! locks que impedem o sistema de descer abaixo de um modo.
//!
//! Detalhes de Implementação:
//! - Ordem total fixa: LightSleep < ApbMin < ApbMax < CpuMax.
//! - Os discriminantes são os índices de bit da máscara de requisições,
//!   então `mask.bits() >= bit(m)` significa "existe pedido em m ou acima".

use bitflags::bitflags;

/// Número de modos de energia
pub const MODE_COUNT: usize = 4;

/// Modos globais de energia, do maior consumo para o menor.
///
/// A ordem derivada (`Ord`) segue a ordem de performance: `CpuMax` é o
/// maior. `LightSleep` só é alcançável com sleep automático habilitado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Mode {
    /// Sleep leve: CPU na frequência mínima, pronto para dormir
    LightSleep = 0,
    /// Frequência mínima configurada (APB reduzido)
    ApbMin = 1,
    /// Frequência máxima do barramento APB
    ApbMax = 2,
    /// Frequência máxima da CPU
    CpuMax = 3,
}

impl Mode {
    /// Todos os modos em ordem crescente de performance
    pub const ALL: [Mode; MODE_COUNT] = [Mode::LightSleep, Mode::ApbMin, Mode::ApbMax, Mode::CpuMax];

    /// Índice nas tabelas por-modo (contagens, frequências, estatísticas)
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit correspondente na máscara de requisições
    #[inline]
    pub fn mask(self) -> ModeMask {
        ModeMask::from_bits_truncate(1 << (self as u32))
    }

    /// Nome legível, usado no dump de estatísticas
    pub fn name(self) -> &'static str {
        match self {
            Mode::LightSleep => "SLEEP",
            Mode::ApbMin => "APB_MIN",
            Mode::ApbMax => "APB_MAX",
            Mode::CpuMax => "CPU_MAX",
        }
    }
}

bitflags! {
    /// Máscara de modos requisitados: bit `m` setado sse count[m] > 0.
    ///
    /// Mantida consistente com as contagens dentro da mesma seção crítica
    /// em toda mutação.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeMask: u32 {
        const LIGHT_SLEEP = 1 << 0;
        const APB_MIN = 1 << 1;
        const APB_MAX = 1 << 2;
        const CPU_MAX = 1 << 3;
    }
}

/// Árbitro: menor modo permitido dado o conjunto de locks ativos.
///
/// Um único lock em qualquer modo força o sistema inteiro a pelo menos
/// aquele patamar. Monotônico: adicionar um lock nunca reduz o modo
/// permitido; remover o último lock do modo mais alto nunca sobe além do
/// próximo pedido ativo.
pub fn lowest_allowed_mode(mask: ModeMask, light_sleep_enabled: bool) -> Mode {
    if mask.bits() >= ModeMask::CPU_MAX.bits() {
        Mode::CpuMax
    } else if mask.bits() >= ModeMask::APB_MAX.bits() {
        Mode::ApbMax
    } else if mask.bits() >= ModeMask::APB_MIN.bits() || !light_sleep_enabled {
        Mode::ApbMin
    } else {
        Mode::LightSleep
    }
}
