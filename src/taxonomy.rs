// src/taxonomy.rs
//! Static event taxonomy: English→Spanish term translation and keyword
//! categorization.
//!
//! `translate` substitutes table terms longest-first with word-boundary
//! matching, so "Core Consumer Price Index" is rewritten as a whole before
//! the shorter "Consumer Price Index" or bare "Price" entries get a chance,
//! and "CPI" never fires inside an unrelated token. The substitution is not
//! idempotent over arbitrary input: translate from the original name exactly
//! once, at ingestion, and never feed a translated value back in.

use once_cell::sync::OnceCell;
use regex::{NoExpand, Regex};

/// Economic term dictionary, English → Spanish.
const TRANSLATIONS: &[(&str, &str)] = &[
    // General indicators
    ("GDP", "PIB"),
    ("Gross Domestic Product", "Producto Interno Bruto"),
    ("CPI", "IPC"),
    ("Consumer Price Index", "Índice de Precios al Consumidor"),
    ("PPI", "IPP"),
    ("Producer Price Index", "Índice de Precios al Productor"),
    ("Unemployment Rate", "Tasa de Desempleo"),
    ("Jobless Claims", "Solicitudes de Desempleo"),
    ("Non-Farm Payrolls", "Nóminas No Agrícolas"),
    ("Retail Sales", "Ventas Minoristas"),
    ("Industrial Production", "Producción Industrial"),
    ("Manufacturing", "Manufactura"),
    ("PMI", "PMI"),
    ("Purchasing Managers Index", "Índice de Gerentes de Compras"),
    ("Trade Balance", "Balanza Comercial"),
    ("Current Account", "Cuenta Corriente"),
    ("Budget", "Presupuesto"),
    ("Deficit", "Déficit"),
    ("Surplus", "Superávit"),
    // Central banks and rates
    ("Interest Rate", "Tasa de Interés"),
    ("Fed", "Fed"),
    ("Federal Reserve", "Reserva Federal"),
    ("ECB", "BCE"),
    ("European Central Bank", "Banco Central Europeo"),
    ("BoC", "BdC"),
    ("Bank of Canada", "Banco de Canada"),
    ("BoE", "BdI"),
    ("Bank of England", "Banco de Inglaterra"),
    ("BoJ", "BdJ"),
    ("Bank of Japan", "Banco de Japón"),
    ("FOMC", "FOMC"),
    ("Monetary Policy", "Política Monetaria"),
    ("Rate Decision", "Decisión de Tasas"),
    ("Meeting Minutes", "Actas de Reunión"),
    ("Speech", "Discurso"),
    ("Press Conference", "Conferencia de Prensa"),
    // Housing and construction
    ("Building Permits", "Permisos de Construcción"),
    ("Housing Starts", "Inicio de Viviendas"),
    ("Home Sales", "Ventas de Viviendas"),
    ("Existing Home Sales", "Ventas de Viviendas Existentes"),
    ("New Home Sales", "Ventas de Viviendas Nuevas"),
    ("Housing Price Index", "Índice de Precios de Vivienda"),
    ("Mortgage", "Hipoteca"),
    // Confidence and sentiment
    ("Consumer Confidence", "Confianza del Consumidor"),
    ("Business Confidence", "Confianza Empresarial"),
    ("Sentiment", "Sentimiento"),
    ("Survey", "Encuesta"),
    // Qualifiers
    ("Preliminary", "Preliminar"),
    ("Final", "Final"),
    ("Revised", "Revisado"),
    ("Flash", "Flash"),
    ("YoY", "Anual"),
    ("MoM", "Mensual"),
    ("QoQ", "Trimestral"),
    ("Annual", "Anual"),
    ("Monthly", "Mensual"),
    ("Quarterly", "Trimestral"),
    ("Change", "Cambio"),
    ("Growth", "Crecimiento"),
    ("Index", "Índice"),
    ("Report", "Reporte"),
    ("Data", "Datos"),
    ("Forecast", "Pronóstico"),
    ("Actual", "Real"),
    ("Previous", "Anterior"),
    ("Core", "Subyacente"),
    ("Inflation", "Inflación"),
    ("Exports", "Exportaciones"),
    ("Imports", "Importaciones"),
    ("Sales", "Ventas"),
    ("Orders", "Pedidos"),
    ("Inventories", "Inventarios"),
    ("Production", "Producción"),
    ("Capacity Utilization", "Utilización de Capacidad"),
    // Common additions
    ("Statement", "Declaración"),
    ("Announcement", "Anuncio"),
    ("Release", "Publicación"),
    ("Economic", "Económico"),
    ("Outlook", "Perspectiva"),
    ("Review", "Revisión"),
    ("Update", "Actualización"),
    ("Estimate", "Estimación"),
    ("Expectations", "Expectativas"),
    ("Projection", "Proyección"),
    ("Indicator", "Indicador"),
    ("Rate", "Tasa"),
    ("Level", "Nivel"),
    ("Value", "Valor"),
    ("Total", "Total"),
    ("Net", "Neto"),
    ("Gross", "Bruto"),
    ("Private", "Privado"),
    ("Public", "Público"),
    ("Government", "Gubernamental"),
    ("Sector", "Sector"),
    ("Activity", "Actividad"),
    ("Performance", "Desempeño"),
    ("Composite", "Compuesto"),
    ("Leading", "Adelantado"),
    ("Lagging", "Rezagado"),
    ("Coincident", "Coincidente"),
    ("Week", "Semana"),
    ("Month", "Mes"),
    ("Quarter", "Trimestre"),
    ("Year", "Año"),
    ("Period", "Período"),
    ("Day", "Día"),
    ("Hour", "Hora"),
    ("Minute", "Minuto"),
    ("Mo", "M"),
    ("Yr", "A"),
    ("Qtr", "T"),
    ("Wk", "Sem"),
    ("Continues", "Continúa"),
    ("Remains", "Permanece"),
    ("Rises", "Sube"),
    ("Falls", "Baja"),
    ("Increases", "Aumenta"),
    ("Decreases", "Disminuye"),
    ("Stable", "Estable"),
    ("Volatile", "Volátil"),
    ("Strong", "Fuerte"),
    ("Weak", "Débil"),
    ("High", "Alto"),
    ("Low", "Bajo"),
    ("Better", "Mejor"),
    ("Worse", "Peor"),
    ("Above", "Por encima"),
    ("Below", "Por debajo"),
    ("Expected", "Esperado"),
    ("Unexpected", "Inesperado"),
    ("Bonus", "Bonificación"),
    ("Bonuses", "Bonificaciones"),
    ("Including", "Incluyendo"),
    ("Excluding", "Excluyendo"),
    ("incl", "incl"),
    ("excl", "excl"),
    ("ex", "ex"),
    ("vs", "vs"),
    ("w/", "c/"),
    ("w/o", "s/"),
    // Markets and finance (singular and plural)
    ("Bill", "Bono"),
    ("Bills", "Bonos"),
    ("Auction", "Subasta"),
    ("Auctions", "Subastas"),
    ("Treasury", "Tesoro"),
    ("Treasuries", "Tesoros"),
    ("Bond", "Bono"),
    ("Bonds", "Bonos"),
    ("Note", "Nota"),
    ("Notes", "Notas"),
    ("Yield", "Rendimiento"),
    ("Yields", "Rendimientos"),
    ("Debt", "Deuda"),
    ("Debts", "Deudas"),
    ("Stock", "Acción"),
    ("Stocks", "Acciones"),
    ("Market", "Mercado"),
    ("Markets", "Mercados"),
    ("Business", "Empresarial"),
    ("Businesses", "Negocios"),
    ("Optimism", "Optimismo"),
    ("Pessimism", "Pesimismo"),
    ("Average", "Promedio"),
    ("Averages", "Promedios"),
    ("Earnings", "Ganancias"),
    ("Earning", "Ganancia"),
    ("Income", "Ingreso"),
    ("Incomes", "Ingresos"),
    ("Profit", "Beneficio"),
    ("Profits", "Beneficios"),
    ("Loss", "Pérdida"),
    ("Losses", "Pérdidas"),
    ("Revenue", "Ingresos"),
    ("Revenues", "Ingresos"),
    ("Cost", "Costo"),
    ("Costs", "Costos"),
    ("Price", "Precio"),
    ("Prices", "Precios"),
    ("Spending", "Gasto"),
    ("Investment", "Inversión"),
    ("Investments", "Inversiones"),
    ("Consumer", "Consumidor"),
    ("Consumers", "Consumidores"),
    ("Commercial", "Comercial"),
    ("Industrial", "Industrial"),
    ("Services", "Servicios"),
    ("Service", "Servicio"),
    ("Construction", "Construcción"),
    ("Transportation", "Transporte"),
    ("Energy", "Energía"),
    ("Utilities", "Servicios Públicos"),
    ("Utility", "Servicio Público"),
    ("Finance", "Finanzas"),
    ("Banking", "Banca"),
    ("Credit", "Crédito"),
    ("Credits", "Créditos"),
    ("Loan", "Préstamo"),
    ("Loans", "Préstamos"),
    ("Mortgages", "Hipotecas"),
    ("Deposit", "Depósito"),
    ("Deposits", "Depósitos"),
    ("Withdrawal", "Retiro"),
    ("Withdrawals", "Retiros"),
    ("Balance", "Saldo"),
    ("Balances", "Saldos"),
    ("Reserve", "Reserva"),
    ("Reserves", "Reservas"),
    ("Currency", "Moneda"),
    ("Currencies", "Monedas"),
    ("Exchange", "Cambio"),
    ("Exchanges", "Cambios"),
    ("Foreign", "Extranjero"),
    ("Domestic", "Doméstico"),
    ("International", "Internacional"),
    ("Global", "Global"),
    ("Regional", "Regional"),
    ("Local", "Local"),
    ("National", "Nacional"),
    // Employment
    ("Employment", "Empleo"),
    ("Payrolls", "Nóminas"),
    ("Payroll", "Nómina"),
    ("Claimant", "Solicitante"),
    ("Claimants", "Solicitantes"),
    ("Count", "Conteo"),
    ("Counts", "Conteos"),
    ("Claimant Count", "Conteo de Solicitantes"),
    ("HMRC", "HMRC"),
    ("Job", "Empleo"),
    ("Jobs", "Empleos"),
    ("Hiring", "Contratación"),
    ("Workers", "Trabajadores"),
    ("Worker", "Trabajador"),
    ("Employee", "Empleado"),
    ("Employees", "Empleados"),
    ("Employer", "Empleador"),
    ("Employers", "Empleadores"),
];

/// Category keyword lists. Keywords are lowercase substrings in both source
/// languages, since events arrive in either depending on the feed revision.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "employment",
        &[
            "employment", "unemployment", "jobless", "payroll", "jobs", "labor", "wage",
            "earnings", "nfp", "empleo", "desempleo", "nómina", "trabajo", "laboral", "salario",
            "ganancias", "sueldo", "claimant", "solicitante", "desempleados",
        ],
    ),
    (
        "inflation",
        &[
            "cpi", "ppi", "inflation", "price index", "prices", "rpi", "core", "inflación",
            "precios", "ipc", "ipp", "índice de precios", "harmonised", "harmonizado",
            "consumer price", "producer price", "precio consumidor", "precio productor",
        ],
    ),
    (
        "monetary",
        &[
            "interest rate", "fed", "fomc", "central bank", "monetary policy", "ecb", "boc",
            "boe", "boj", "rba", "rbnz", "tasa de interés", "política monetaria",
            "banco central", "bdi", "bdc", "bde", "speech", "discurso", "minutes", "actas",
            "decision", "decisión", "bond", "bill", "note", "auction", "bono", "letra",
            "subasta", "treasury", "tesoro", "yield", "rendimiento", "debt", "deuda",
        ],
    ),
    (
        "manufacturing",
        &[
            "manufacturing", "pmi", "industrial production", "factory", "orders", "output",
            "manufactura", "producción industrial", "fábrica", "órdenes", "pedidos",
            "producción", "industrial", "factory orders", "pedidos industriales",
        ],
    ),
    (
        "services",
        &[
            "services", "retail sales", "consumer spending", "consumption", "servicios",
            "ventas minoristas", "gasto del consumidor", "consumo", "ventas", "sales",
            "spending", "gastos", "construction", "construcción", "building", "permits",
            "permisos", "vivienda", "housing",
        ],
    ),
    (
        "trade",
        &[
            "trade", "export", "import", "balance", "current account", "goods", "comercio",
            "exportación", "importación", "balanza", "cuenta corriente", "bienes",
            "trade balance", "balanza comercial", "customs", "aduana",
        ],
    ),
    (
        "gdp",
        &[
            "gdp", "gross domestic", "economic growth", "growth rate", "pib",
            "producto interno", "producto bruto", "crecimiento económico", "crecimiento",
        ],
    ),
    (
        "energy",
        &[
            "oil", "energy", "crude", "natural gas", "petroleum", "eia", "opec", "petróleo",
            "energía", "crudo", "gas", "inventories", "inventarios", "stocks",
        ],
    ),
    (
        "confidence",
        &[
            "confidence", "sentiment", "survey", "outlook", "expectations", "index",
            "optimism", "confianza", "sentimiento", "encuesta", "perspectivas",
            "expectativas", "índice", "optimismo", "business", "consumer", "negocios",
            "consumidor", "empresarial", "zew", "ifo", "nfib",
        ],
    ),
];

/// Compiled substitutions, longest source term first so multi-word entries
/// win over their fragments.
fn substitutions() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceCell<Vec<(Regex, &'static str)>> = OnceCell::new();
    COMPILED.get_or_init(|| {
        let mut entries: Vec<(&str, &str)> = TRANSLATIONS.to_vec();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        entries
            .into_iter()
            .map(|(en, es)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(en));
                (
                    Regex::new(&pattern).expect("taxonomy term compiles to a valid regex"),
                    es,
                )
            })
            .collect()
    })
}

/// Translate a source-language event name term by term.
pub fn translate(name: &str) -> String {
    let mut out = name.to_string();
    for (re, replacement) in substitutions() {
        if re.is_match(&out) {
            out = re.replace_all(&out, NoExpand(*replacement)).into_owned();
        }
    }
    out.trim().to_string()
}

/// Every category whose keyword list matches somewhere in the name.
/// Zero, one, or several categories are all normal outcomes.
pub fn categorize(name: &str) -> Vec<&'static str> {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .collect()
}

/// First matching category, the one stored on the record.
pub fn primary_category(name: &str) -> Option<&'static str> {
    categorize(name).into_iter().next()
}
