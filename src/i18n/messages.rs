// 訊息範本；`{name}` 為佔位符

pub(super) const EN: &[(&str, &str)] = &[
    ("search_terms.negative.title", "Add \"{term}\" as a negative keyword"),
    ("search_terms.negative.desc", "The search term spent {cost} over {clicks} clicks without converting."),
    ("search_terms.harvest.title", "Add \"{term}\" as an exact match keyword"),
    ("search_terms.harvest.desc", "{conversions} conversions at a CPA of {cpa} (target {target})."),
    ("search_terms.summary", "{count} search terms reviewed; {wasted} wasted spend ({pct})."),
    ("keyword_match.broad.title", "Tighten broad match in {campaign}"),
    ("keyword_match.broad.desc", "Broad match CPA {broad_cpa} is {ratio}x the exact match CPA {exact_cpa} and takes {share} of spend."),
    ("keyword_match.broad_waste.title", "Review broad keyword \"{keyword}\""),
    ("keyword_match.broad_waste.desc", "Broad match keyword spent {cost} without conversions."),
    ("keyword_match.low_qs.title", "Improve quality score of \"{keyword}\""),
    ("keyword_match.low_qs.desc", "Quality score {score}/10 with {cost} spend."),
    ("keyword_match.duplicate.title", "Consolidate duplicate keyword \"{keyword}\""),
    ("keyword_match.duplicate.desc", "{match_type} keyword appears in {count} ad groups: {ad_groups}."),
    ("keyword_match.zero_impr.title", "Pause or review \"{keyword}\""),
    ("keyword_match.zero_impr.desc", "Enabled keyword received no impressions in the period."),
    ("keyword_match.summary", "{count} keywords reviewed; broad match takes {broad_share} of spend."),
    ("negative_conflicts.title", "Negative \"{negative}\" blocks keyword \"{keyword}\""),
    ("negative_conflicts.desc", "{level} negative ({match_type}) prevents \"{keyword}\" in {campaign} from serving; it had {conversions} conversions."),
    ("negative_conflicts.summary", "{count} conflicts between {negatives} negatives and {keywords} keywords."),
    ("geo.increase.title", "Increase bids in {location}"),
    ("geo.increase.desc", "CPA {cpa} vs account {account_cpa}; suggested bid modifier {modifier}."),
    ("geo.decrease.title", "Decrease bids in {location}"),
    ("geo.decrease.desc", "CPA {cpa} vs account {account_cpa}; suggested bid modifier {modifier}."),
    ("geo.exclude.title", "Exclude {location}"),
    ("geo.exclude.desc", "Spent {cost} with no conversions."),
    ("geo.summary", "{count} locations analyzed against an account CPA of {account_cpa}."),
    ("daypart.exclude.title", "Exclude {slot} from the ad schedule"),
    ("daypart.exclude.desc", "Spent {cost} with no conversions."),
    ("daypart.increase.title", "Increase bids during {slot}"),
    ("daypart.increase.desc", "Conversion rate {rate} vs account {account_rate}."),
    ("daypart.decrease.title", "Decrease bids during {slot}"),
    ("daypart.decrease.desc", "CPA {cpa} vs account {account_cpa}."),
    ("daypart.summary", "Best day {best_day}, worst day {worst_day}."),
    ("bid.device.title", "Set {device} bid modifier to {target} in {campaign}"),
    ("bid.device.desc", "Current modifier {current}; {device} efficiency is {efficiency} of the campaign average."),
    ("bid.summary", "{count} campaign/device combinations evaluated."),
    ("pmax.overlap.title", "Performance Max overlaps Search on \"{term}\""),
    ("pmax.overlap.desc", "{pmax_campaign} spent {pmax_cost} on a term covered by {search_campaign}."),
    ("pmax.negative.title", "Add \"{term}\" as an account-level negative for Performance Max"),
    ("pmax.negative.desc", "Spent {cost} in Performance Max without conversions."),
    ("pmax.summary", "Performance Max takes {share} of spend; {overlaps} overlapping terms."),
    ("level.campaign", "Campaign"),
    ("level.ad_group", "Ad group"),
    ("level.shared_list", "Shared list"),
    ("weekday.mon", "Monday"),
    ("weekday.tue", "Tuesday"),
    ("weekday.wed", "Wednesday"),
    ("weekday.thu", "Thursday"),
    ("weekday.fri", "Friday"),
    ("weekday.sat", "Saturday"),
    ("weekday.sun", "Sunday"),
    ("device.mobile", "Mobile"),
    ("device.desktop", "Desktop"),
    ("device.tablet", "Tablet"),
    ("device.connected_tv", "Connected TV"),
    ("device.other", "Other devices"),
];

pub(super) const ES: &[(&str, &str)] = &[
    ("search_terms.negative.title", "Agregar \"{term}\" como palabra clave negativa"),
    ("search_terms.negative.desc", "El término de búsqueda gastó {cost} en {clicks} clics sin convertir."),
    ("search_terms.harvest.title", "Agregar \"{term}\" como palabra clave de concordancia exacta"),
    ("search_terms.harvest.desc", "{conversions} conversiones con un CPA de {cpa} (objetivo {target})."),
    ("search_terms.summary", "{count} términos revisados; {wasted} de gasto desperdiciado ({pct})."),
    ("keyword_match.broad.title", "Restringir la concordancia amplia en {campaign}"),
    ("keyword_match.broad.desc", "El CPA de concordancia amplia {broad_cpa} es {ratio}x el CPA exacto {exact_cpa} y representa {share} del gasto."),
    ("keyword_match.broad_waste.title", "Revisar la palabra clave amplia \"{keyword}\""),
    ("keyword_match.broad_waste.desc", "La palabra clave amplia gastó {cost} sin conversiones."),
    ("keyword_match.low_qs.title", "Mejorar el nivel de calidad de \"{keyword}\""),
    ("keyword_match.low_qs.desc", "Nivel de calidad {score}/10 con un gasto de {cost}."),
    ("keyword_match.duplicate.title", "Consolidar la palabra clave duplicada \"{keyword}\""),
    ("keyword_match.duplicate.desc", "La palabra clave {match_type} aparece en {count} grupos de anuncios: {ad_groups}."),
    ("keyword_match.zero_impr.title", "Pausar o revisar \"{keyword}\""),
    ("keyword_match.zero_impr.desc", "La palabra clave activa no recibió impresiones en el período."),
    ("keyword_match.summary", "{count} palabras clave revisadas; la concordancia amplia representa {broad_share} del gasto."),
    ("negative_conflicts.title", "La negativa \"{negative}\" bloquea la palabra clave \"{keyword}\""),
    ("negative_conflicts.desc", "La negativa de {level} ({match_type}) impide que \"{keyword}\" en {campaign} se publique; tuvo {conversions} conversiones."),
    ("negative_conflicts.summary", "{count} conflictos entre {negatives} negativas y {keywords} palabras clave."),
    ("geo.increase.title", "Aumentar las pujas en {location}"),
    ("geo.increase.desc", "CPA {cpa} frente a {account_cpa} de la cuenta; ajuste sugerido {modifier}."),
    ("geo.decrease.title", "Reducir las pujas en {location}"),
    ("geo.decrease.desc", "CPA {cpa} frente a {account_cpa} de la cuenta; ajuste sugerido {modifier}."),
    ("geo.exclude.title", "Excluir {location}"),
    ("geo.exclude.desc", "Gastó {cost} sin conversiones."),
    ("geo.summary", "{count} ubicaciones analizadas frente a un CPA de cuenta de {account_cpa}."),
    ("daypart.exclude.title", "Excluir {slot} de la programación de anuncios"),
    ("daypart.exclude.desc", "Gastó {cost} sin conversiones."),
    ("daypart.increase.title", "Aumentar las pujas durante {slot}"),
    ("daypart.increase.desc", "Tasa de conversión {rate} frente a {account_rate} de la cuenta."),
    ("daypart.decrease.title", "Reducir las pujas durante {slot}"),
    ("daypart.decrease.desc", "CPA {cpa} frente a {account_cpa} de la cuenta."),
    ("daypart.summary", "Mejor día {best_day}, peor día {worst_day}."),
    ("bid.device.title", "Fijar el ajuste de puja de {device} en {target} en {campaign}"),
    ("bid.device.desc", "Ajuste actual {current}; la eficiencia de {device} es {efficiency} del promedio de la campaña."),
    ("bid.summary", "{count} combinaciones de campaña y dispositivo evaluadas."),
    ("pmax.overlap.title", "Performance Max se superpone con Búsqueda en \"{term}\""),
    ("pmax.overlap.desc", "{pmax_campaign} gastó {pmax_cost} en un término cubierto por {search_campaign}."),
    ("pmax.negative.title", "Agregar \"{term}\" como negativa de cuenta para Performance Max"),
    ("pmax.negative.desc", "Gastó {cost} en Performance Max sin conversiones."),
    ("pmax.summary", "Performance Max representa {share} del gasto; {overlaps} términos superpuestos."),
    ("level.campaign", "campaña"),
    ("level.ad_group", "grupo de anuncios"),
    ("level.shared_list", "lista compartida"),
    ("weekday.mon", "lunes"),
    ("weekday.tue", "martes"),
    ("weekday.wed", "miércoles"),
    ("weekday.thu", "jueves"),
    ("weekday.fri", "viernes"),
    ("weekday.sat", "sábado"),
    ("weekday.sun", "domingo"),
    ("device.mobile", "Móviles"),
    ("device.desktop", "Ordenadores"),
    ("device.tablet", "Tablets"),
    ("device.connected_tv", "TV conectada"),
    ("device.other", "Otros dispositivos"),
];
